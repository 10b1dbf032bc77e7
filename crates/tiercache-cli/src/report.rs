//! Report output formatting.

use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use tiercache_core::CacheTier;

use crate::simulate::{Outcome, INVALIDATED_DEPENDENCY, INVALIDATED_TAG};

/// Print the outcome as pretty JSON
pub fn print_json(outcome: &Outcome) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

/// Print the outcome as summary lines plus a per-tier table
pub fn print_text(outcome: &Outcome) {
    let stats = &outcome.report.stats;
    let metrics = &stats.metrics;

    println!("\n{}", "Workload".green().bold());
    println!("  Keys populated:   {}", outcome.keys);
    println!("  Reads issued:     {}", outcome.reads);
    println!(
        "  Warmed:           {} of {} enqueued",
        outcome.warm_loaded, outcome.warm_enqueued
    );
    println!(
        "  Invalidated:      {} by '{}', {} by '{}'",
        outcome.dependency_invalidated,
        INVALIDATED_DEPENDENCY,
        outcome.tag_invalidated,
        INVALIDATED_TAG
    );
    println!(
        "  Maintenance:      {} expired, {} demoted, {} promoted, {} evicted",
        outcome.maintenance.expired,
        outcome.maintenance.demoted,
        outcome.maintenance.promoted,
        outcome.maintenance.evicted
    );
    println!("  Duration:         {} ms", outcome.elapsed_ms);

    println!("\n{}", "Tiers".green().bold());
    println!("{}", tier_table(outcome));

    println!("\n{}", "Counters".green().bold());
    println!("  Hits / misses:    {} / {}", metrics.hits, metrics.misses);
    println!(
        "  Hit rate:         {:.1}% lifetime, {:.1}% over last {} gets",
        outcome.report.lifetime_hit_rate * 100.0,
        outcome.report.recent_hit_ratio * 100.0,
        outcome.report.window_get_samples
    );
    println!(
        "  Avg get latency:  {:.2} µs",
        outcome.report.avg_get_latency.as_secs_f64() * 1_000_000.0
    );
    println!("  Evictions:        {}", metrics.evictions);
    println!("  Invalidations:    {}", metrics.invalidations);
    println!(
        "  Promotions:       {} up, {} down",
        metrics.tier_promotions, metrics.tier_demotions
    );
    let failures = if metrics.warming_failures > 0 {
        metrics.warming_failures.to_string().red().to_string()
    } else {
        metrics.warming_failures.to_string()
    };
    println!(
        "  Warming:          {} queued, {} failed",
        metrics.warming_operations, failures
    );

    if !stats.hot_keys_sample.is_empty() {
        println!("\n{}", "Hot keys".green().bold());
        println!("  {}", stats.hot_keys_sample.join(", "));
    }
}

/// Entry count and memory per tier, hottest first
pub fn tier_table(outcome: &Outcome) -> Table {
    let stats = &outcome.report.stats;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("tier").fg(Color::Cyan),
        Cell::new("entries").fg(Color::Cyan),
        Cell::new("bytes").fg(Color::Cyan),
    ]);

    for tier in CacheTier::ALL.iter().rev() {
        table.add_row(vec![
            Cell::new(tier.as_str()),
            Cell::new(stats.entries_by_tier.get(*tier)),
            Cell::new(stats.memory_by_tier.get(*tier)),
        ]);
    }
    table.add_row(vec![
        Cell::new("total").fg(Color::Yellow),
        Cell::new(stats.total_entries),
        Cell::new(stats.memory_usage),
    ]);

    table
}
