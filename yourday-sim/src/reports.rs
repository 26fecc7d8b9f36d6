use anyhow::Result;
use colored::Colorize;
use std::io::Write;
use std::time::Duration;

use crate::runner::ScenarioResult;

fn success_rate(results: &[ScenarioResult]) -> f64 {
    let total = u32::try_from(results.len()).unwrap_or(u32::MAX);
    if total == 0 {
        return 0.0;
    }
    let passed = u32::try_from(results.iter().filter(|r| r.passed).count()).unwrap_or(0);
    f64::from(passed) / f64::from(total) * 100.0
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Economy Simulation Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "=============================".cyan())?;

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    writeln!(out, "Total scenario runs: {total}")?;
    writeln!(out, "Passed: {}", passed.to_string().green())?;
    writeln!(out, "Failed: {}", (total - passed).to_string().red())?;
    writeln!(out, "Success rate: {:.1}%", success_rate(results))?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };
        writeln!(
            out,
            "{} {} (seed {})",
            status,
            result.scenario_name.bold(),
            result.seed
        )?;
        writeln!(
            out,
            "   Iterations: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "   Average time: {:?}", result.average_duration)?;
        let m = &result.metrics;
        writeln!(
            out,
            "   Ledger: {:.0} points, level {:.1} (max {}), garden value {:.0}",
            m.mean_points, m.mean_level, m.max_level, m.mean_garden_value
        )?;
        writeln!(
            out,
            "   Scoring: {:.0} points awarded over {:.1} days, peak garden value {:.0}",
            m.mean_awarded, m.mean_evaluated_days, m.mean_peak_garden_value
        )?;
        writeln!(
            out,
            "   Gacha: {:.1} pulls, {:.1} plants, {:.0} draws",
            m.mean_pulls, m.mean_plants_pulled, m.mean_rng_draws
        )?;
        writeln!(
            out,
            "   Garden: {:.1} planted, {:.1} waterings, {:.1} fertilized, {:.1} sold for {:.0}",
            m.mean_planted, m.mean_waterings, m.mean_fertilized, m.mean_sold, m.mean_sale_income
        )?;
        writeln!(
            out,
            "   Upkeep: {:.1} plots bought, {:.1} fertilizer made, {:.1} refused actions",
            m.mean_plots_bought, m.mean_fertilizer_made, m.mean_refusals
        )?;
        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    if let (Some(fastest), Some(slowest)) = (
        results.iter().min_by_key(|r| r.average_duration),
        results.iter().max_by_key(|r| r.average_duration),
    ) {
        writeln!(out, "{}", "⚡ Performance Summary".bright_yellow().bold())?;
        writeln!(out, "{}", "=====================".yellow())?;
        writeln!(
            out,
            "Fastest: {} ({:?})",
            fastest.scenario_name.green(),
            fastest.average_duration
        )?;
        writeln!(
            out,
            "Slowest: {} ({:?})",
            slowest.scenario_name.yellow(),
            slowest.average_duration
        )?;
    }
    Ok(())
}

pub fn generate_json_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(results)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    writeln!(out, "# YourDay Economy Simulation Results\n")?;

    let total = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total scenario runs**: {total}")?;
    writeln!(out, "- **Passed**: {passed}")?;
    writeln!(out, "- **Failed**: {}", total - passed)?;
    writeln!(out, "- **Success rate**: {:.1}%\n", success_rate(results))?;

    writeln!(out, "## Detailed Results\n")?;
    writeln!(
        out,
        "| Scenario | Seed | Status | Iterations | Mean points | Mean level | Mean garden value |"
    )?;
    writeln!(out, "|---|---|---|---|---|---|---|")?;
    for result in results {
        let status = if result.passed { "✅" } else { "❌" };
        writeln!(
            out,
            "| {} | {} | {} | {}/{} | {:.0} | {:.1} | {:.0} |",
            result.scenario_name,
            result.seed,
            status,
            result.successful_iterations,
            result.iterations_run,
            result.metrics.mean_points,
            result.metrics.mean_level,
            result.metrics.mean_garden_value
        )?;
    }

    let failing: Vec<&ScenarioResult> = results.iter().filter(|r| !r.passed).collect();
    if !failing.is_empty() {
        writeln!(out, "\n## Failures\n")?;
        for result in failing {
            writeln!(out, "### {} (seed {})\n", result.scenario_name, result.seed)?;
            for failure in &result.failures {
                writeln!(out, "- {failure}")?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}
