//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command opens the configured store, hydrates the selected profile,
//! runs one service command and prints the result. Commands that may queue a
//! level milestone wait for it before exiting, so the stored snapshot
//! already includes the deferred badge.

use crate::api;
use crate::config::AppConfig;
use crate::timer::{SharedService, open_shared, settle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stride_core::{
    BadgeCatalog, BadgeId, CommandReport, Profile, ProfileId, ProgressionService, StrideError,
    snapshot_to_bytes, snapshot_to_json,
};

/// Settings shared by every one-shot command.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config: AppConfig,
    pub profile: ProfileId,
    pub json_mode: bool,
}

/// Opportunity interaction selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Save,
    Unsave,
    Apply,
    Complete,
}

// =============================================================================
// HELPERS
// =============================================================================

/// Validate output path for security.
///
/// The parent directory must exist; it is canonicalized to resolve `..` and
/// symlinks before the file name is joined back on.
fn validate_output_path(path: &Path) -> Result<PathBuf, StrideError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        StrideError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(StrideError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| StrideError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Hydrate the selected profile from the configured store.
pub fn open_profile(ctx: &CliContext) -> Result<SharedService, StrideError> {
    let store = ctx.config.open_store()?;
    Ok(open_shared(
        ctx.profile.clone(),
        store,
        Arc::new(BadgeCatalog::standard()),
        ctx.config.progression,
    ))
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

/// Run one command, wait for deferred unlocks, then report.
async fn run_command<F>(ctx: &CliContext, command: F) -> Result<(), StrideError>
where
    F: FnOnce(&mut ProgressionService) -> Result<CommandReport, StrideError>,
{
    let service = open_profile(ctx)?;
    let (report, unlocked_before) = {
        let mut guard = service.lock().await;
        let report = command(&mut *guard)?;
        (report, guard.state().unlocked_badges().len())
    };

    if !report.deferred.is_empty() && !ctx.json_mode {
        println!("Level milestone pending, settling...");
    }
    settle(&service).await;

    let guard = service.lock().await;
    let late: Vec<BadgeId> = guard
        .state()
        .unlocked_badges()
        .iter()
        .skip(unlocked_before)
        .map(|b| b.id.clone())
        .collect();

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "profile": ctx.profile,
            "report": report,
            "deferred_unlocked": late,
            "summary": guard.summary(),
        }));
        return Ok(());
    }

    print_report(&guard, &report, &late);
    Ok(())
}

fn badge_label(service: &ProgressionService, id: &BadgeId) -> String {
    service
        .catalog()
        .get(id)
        .map(|b| b.display())
        .unwrap_or_else(|| id.to_string())
}

fn print_report(service: &ProgressionService, report: &CommandReport, late: &[BadgeId]) {
    if !report.changed {
        println!("No change.");
    }
    if let Some(grant) = &report.grant {
        if grant.amount > 0 {
            println!("+{} XP", grant.amount);
        }
        if grant.leveled_up {
            println!("Level up! Now level {}", grant.level);
        }
    }
    if let Some(streak) = report.check_in.and_then(|o| o.new_streak()) {
        println!("Streak: {} day(s)", streak);
    }
    for id in report.unlocked.iter().chain(late) {
        println!("Badge unlocked: {}", badge_label(service, id));
    }

    let summary = service.summary();
    println!();
    println!(
        "Level {} | {} XP | {} XP to next level | streak {}",
        summary.level, summary.xp, summary.xp_to_next_level, summary.current_streak
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &AppConfig) -> Result<(), StrideError> {
    println!("Stride Progression Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Backend:  {}", config.storage.backend);
    println!("  Data:     {}", config.data_path().display());
    println!(
        "  Deferred unlock delay: {} ms",
        config.progression.deferred_unlock_delay_ms
    );
    println!();
    println!("Endpoints:");
    println!("  GET  /health                      - Health check");
    println!("  GET  /badges                      - Badge catalog");
    println!("  GET  /profiles/{{id}}               - Progression state");
    println!("  GET  /profiles/{{id}}/summary       - Progress overview");
    println!("  POST /profiles/{{id}}/check-in      - Daily check-in");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config).await
}

// =============================================================================
// READ COMMANDS
// =============================================================================

/// Show the full progression state.
pub async fn cmd_show(ctx: &CliContext) -> Result<(), StrideError> {
    let service = open_profile(ctx)?;
    let service = service.lock().await;
    let view = service.view();

    if ctx.json_mode {
        print_json(&view);
        return Ok(());
    }

    println!("Stride Profile: {}", view.profile_id);
    println!("==================");
    match &view.profile {
        Some(p) => println!("Name:       {} (grade {})", p.name, p.grade),
        None => println!("Name:       (not set)"),
    }
    println!("Onboarded:  {}", view.is_onboarded);
    println!("XP:         {}", view.xp);
    println!("Level:      {}", view.level);
    println!("To next:    {} XP", view.xp_to_next_level);
    println!(
        "Streak:     {} (longest {})",
        view.streak.current, view.streak.longest
    );
    println!("Saved:      {}", view.saved.len());
    println!("Applied:    {}", view.applied.len());
    println!("Completed:  {}", view.completed.len());
    println!();
    println!("Badges ({}):", view.unlocked_badges.len());
    for badge in &view.unlocked_badges {
        println!(
            "  {}  {}",
            badge.unlocked_at.format("%Y-%m-%d"),
            badge_label(&service, &badge.id)
        );
    }
    Ok(())
}

/// Show the progress overview.
pub async fn cmd_summary(ctx: &CliContext) -> Result<(), StrideError> {
    let service = open_profile(ctx)?;
    let service = service.lock().await;
    let summary = service.summary();

    if ctx.json_mode {
        print_json(&summary);
        return Ok(());
    }

    println!("Stride Summary: {}", ctx.profile);
    println!("==================");
    println!("Level:    {}", summary.level);
    println!(
        "XP:       {} ({}% of this level, {} to next)",
        summary.xp, summary.progress_percent, summary.xp_to_next_level
    );
    println!(
        "Streak:   {} day(s), longest {}{}",
        summary.current_streak,
        summary.longest_streak,
        if summary.streak_active { "" } else { " (inactive)" }
    );
    println!("Badges:   {}", summary.badge_count);
    for badge in &summary.recent_badges {
        println!("  - {}", badge_label(&service, &badge.id));
    }
    Ok(())
}

/// List the badge catalog, marking unlocked badges.
pub async fn cmd_badges(ctx: &CliContext) -> Result<(), StrideError> {
    let service = open_profile(ctx)?;
    let service = service.lock().await;

    if ctx.json_mode {
        print_json(service.catalog());
        return Ok(());
    }

    println!("Badge Catalog (v{})", service.catalog().version());
    println!("==================");
    for badge in service.catalog().iter() {
        let mark = if service.state().is_unlocked(&badge.badge_id()) {
            "x"
        } else {
            " "
        };
        println!(
            "[{}] {:<18} {} - {}",
            mark,
            badge.id,
            badge.display(),
            badge.description
        );
    }
    Ok(())
}

/// Show progress towards locked badges.
pub async fn cmd_progress(ctx: &CliContext) -> Result<(), StrideError> {
    let service = open_profile(ctx)?;
    let service = service.lock().await;
    let progress = service.badge_progress();

    if ctx.json_mode {
        print_json(&progress);
        return Ok(());
    }

    println!("Badge Progress: {}", ctx.profile);
    println!("==================");
    for entry in &progress {
        println!(
            "{:>3}%  {:<28} {}/{}",
            entry.percent,
            entry.badge.display(),
            entry.current,
            entry.required
        );
    }
    Ok(())
}

// =============================================================================
// MUTATING COMMANDS
// =============================================================================

/// Set the profile (if a name is given) and complete onboarding.
pub async fn cmd_onboard(
    ctx: &CliContext,
    name: Option<String>,
    grade: u8,
    interests: Vec<String>,
    goals: Vec<String>,
) -> Result<(), StrideError> {
    run_command(ctx, move |service| {
        let mut report = CommandReport::default();
        if let Some(name) = name {
            let mut profile = Profile::new(name, grade);
            profile.interests.extend(interests);
            profile.goals.extend(goals);
            report = service.set_profile(profile);
        }
        Ok(merge_reports(report, service.complete_onboarding()))
    })
    .await
}

/// Combine the reports of two commands run back to back.
fn merge_reports(first: CommandReport, second: CommandReport) -> CommandReport {
    let grant = match (first.grant, second.grant) {
        (Some(a), Some(b)) => Some(stride_core::XpGrant {
            source: b.source,
            amount: a.amount.saturating_add(b.amount),
            level: b.level,
            leveled_up: a.leveled_up || b.leveled_up,
        }),
        (a, b) => b.or(a),
    };
    let mut unlocked = first.unlocked;
    unlocked.extend(second.unlocked);
    let mut deferred = first.deferred;
    deferred.extend(second.deferred);
    CommandReport {
        changed: first.changed || second.changed,
        grant,
        check_in: second.check_in.or(first.check_in),
        unlocked,
        deferred,
    }
}

/// Record today's check-in.
pub async fn cmd_check_in(ctx: &CliContext) -> Result<(), StrideError> {
    run_command(ctx, |service| {
        let now = service.now();
        Ok(service.check_in(now))
    })
    .await
}

/// Grant XP.
pub async fn cmd_add_xp(ctx: &CliContext, amount: u64) -> Result<(), StrideError> {
    run_command(ctx, |service| {
        let before = service.pending_unlocks();
        let grant = service.add_xp(amount);
        let deferred = service
            .pending_unlocks()
            .into_iter()
            .filter(|p| !before.contains(p))
            .map(|p| p.badge)
            .collect();
        Ok(CommandReport {
            changed: amount > 0,
            grant: Some(grant),
            deferred,
            ..CommandReport::default()
        })
    })
    .await
}

/// Save, unsave, apply or complete an opportunity.
pub async fn cmd_interaction(
    ctx: &CliContext,
    kind: Interaction,
    id: &str,
) -> Result<(), StrideError> {
    run_command(ctx, |service| match kind {
        Interaction::Save => service.save(id),
        Interaction::Unsave => service.unsave(id),
        Interaction::Apply => service.apply(id),
        Interaction::Complete => service.complete(id),
    })
    .await
}

/// Unlock a badge directly.
pub async fn cmd_unlock(ctx: &CliContext, badge: &str) -> Result<(), StrideError> {
    let id = BadgeId::new(badge);
    run_command(ctx, |service| {
        if !service.catalog().contains(&id) {
            tracing::warn!(%id, "unknown badge id; nothing to unlock");
        }
        Ok(service.unlock_badge(&id))
    })
    .await
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Write the persisted snapshot to `output` as `binary` or `json`.
pub async fn cmd_export(ctx: &CliContext, output: &Path, format: &str) -> Result<(), StrideError> {
    let output = validate_output_path(output)?;
    let service = open_profile(ctx)?;
    let snapshot = service.lock().await.snapshot();

    let bytes = match format {
        "binary" => snapshot_to_bytes(&snapshot)?,
        "json" => snapshot_to_json(&snapshot)?.into_bytes(),
        other => {
            return Err(StrideError::Config(format!(
                "Unknown export format '{}' (expected binary or json)",
                other
            )));
        }
    };

    std::fs::write(&output, &bytes)
        .map_err(|e| StrideError::Io(format!("Write {}: {}", output.display(), e)))?;

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "profile": ctx.profile,
            "format": format,
            "output": output.to_string_lossy(),
            "size_bytes": bytes.len(),
        }));
    } else {
        println!(
            "Exported {} ({} bytes, {}) to {}",
            ctx.profile,
            bytes.len(),
            format,
            output.display()
        );
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
