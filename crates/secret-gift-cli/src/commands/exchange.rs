//! Exchange commands: participants, rules, drawing and status.

use std::path::Path;

use anyhow::{Context, Result};
use humansize::{format_size, DECIMAL};
use secret_gift_ops::{OpsContext, RuleKind, RuleRequest, StatusResponse};

/// Create the `.gift` folder.
pub fn init(ctx: &OpsContext, root: &Path, force: bool) -> Result<()> {
    let response = ctx.init(root, force)?;
    if response.created {
        println!("✅ Initialized exchange in {}", response.path.display());
    } else {
        println!(
            "✓ Exchange already exists in {} (use --force to start over)",
            response.path.display()
        );
    }
    Ok(())
}

/// Add comma-separated participants.
pub fn add_participants(ctx: &OpsContext, root: &Path, names: &str) -> Result<()> {
    let response = ctx.add_participants(root, names)?;
    if response.changed.is_empty() {
        println!("No new participants (names are empty or already present)");
    }
    for name in &response.changed {
        println!("➕ {}", name);
    }
    println!("   Participants: {}", response.participants.len());
    Ok(())
}

/// Rename a participant.
pub fn rename_participant(ctx: &OpsContext, root: &Path, old: &str, new: &str) -> Result<()> {
    ctx.rename_participant(root, old, new)?;
    println!("✏️  Renamed {} to {}", old, new);
    Ok(())
}

/// Remove a participant.
pub fn remove_participant(ctx: &OpsContext, root: &Path, name: &str) -> Result<()> {
    let response = ctx.remove_participant(root, name)?;
    println!("➖ Removed {}", name);
    println!("   Participants: {}", response.participants.len());
    Ok(())
}

/// List participants in insertion order.
pub fn list_participants(ctx: &OpsContext, root: &Path) -> Result<()> {
    let status = ctx.status(root)?;
    if status.participants.is_empty() {
        println!("No participants yet. Add some with `sg participant add`.");
    }
    for p in &status.participants {
        println!("{}", p.name);
    }
    Ok(())
}

/// Add a restriction or mandate.
pub fn add_rule(ctx: &OpsContext, root: &Path, request: RuleRequest) -> Result<()> {
    let response = ctx
        .add_rule(root, &request)
        .with_context(|| format!("Cannot add {}", describe(&request)))?;
    if response.changed {
        println!("✅ Added {}", describe(&request));
    } else {
        println!("✓ {} already present", describe(&request));
    }
    Ok(())
}

/// Remove a restriction or mandate.
pub fn remove_rule(ctx: &OpsContext, root: &Path, request: RuleRequest) -> Result<()> {
    let response = ctx.remove_rule(root, &request)?;
    if response.changed {
        println!("✅ Removed {}", describe(&request));
    } else {
        println!("✓ No such {}", describe(&request));
    }
    Ok(())
}

/// List all rules grouped by giver.
pub fn list_rules(ctx: &OpsContext, root: &Path) -> Result<()> {
    let status = ctx.status(root)?;
    if status.rule_count == 0 {
        println!("No rules");
        return Ok(());
    }
    for p in &status.participants {
        for receiver in &p.restrictions {
            println!("🚫 {} ↛ {}", p.name, receiver);
        }
        if let Some(receiver) = &p.mandate {
            println!("🎯 {} → {}", p.name, receiver);
        }
    }
    Ok(())
}

/// Complete setup and draw.
pub fn setup(ctx: &OpsContext, root: &Path) -> Result<()> {
    let response = ctx
        .setup(root)
        .context("Setup failed; adjust participants or rules and try again")?;
    println!("🎁 Setup complete: {} participants drawn", response.participants);
    println!("   Each giver can now run `sg reveal <name> --probe <file>`");
    Ok(())
}

/// Draw a fresh assignment.
pub fn shuffle(ctx: &OpsContext, root: &Path) -> Result<()> {
    let response = ctx.shuffle(root)?;
    println!("🔀 Reshuffled (draw #{})", response.generation);
    println!("   All verifications were cleared");
    Ok(())
}

/// Print exchange status.
pub fn status(ctx: &OpsContext, root: &Path, json: bool) -> Result<()> {
    let status = ctx.status(root)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    print_status(&status);
    Ok(())
}

/// Wipe the exchange contents.
pub fn reset(ctx: &OpsContext, root: &Path) -> Result<()> {
    ctx.reset(root)?;
    println!("🧹 Exchange reset");
    Ok(())
}

fn print_status(status: &StatusResponse) {
    println!("📊 Secret-Gift Status");
    println!("{:─<50}", "");
    println!();
    println!("📍 Path:         {}", status.path.display());
    println!(
        "⚙️  Setup:        {}",
        if status.setup_complete { "complete" } else { "in progress" }
    );
    println!(
        "🎁 Assignment:   {}",
        if status.has_assignment {
            format!("draw #{}", status.generation)
        } else {
            "none".to_string()
        }
    );
    println!("📜 Rules:        {}", status.rule_count);
    println!(
        "🙂 Faces:        {}/{} registered, {} verified",
        status.registered_count(),
        status.participants.len(),
        status.verified_count()
    );
    println!(
        "💾 Store:        {} ({} backups)",
        format_size(status.store_size, DECIMAL),
        status.backup_count
    );

    if !status.participants.is_empty() {
        println!();
        println!("👥 Participants:");
        for p in &status.participants {
            println!(
                "   • {:<16} {} {}",
                p.name.as_str(),
                if p.registered { "face" } else { "    " },
                if p.verified { "✓ verified" } else { "" }
            );
        }
    }
}

fn describe(request: &RuleRequest) -> String {
    let arrow = match request.kind {
        RuleKind::Restriction => "↛",
        RuleKind::Mandate => "→",
    };
    format!("{} {} {} {}", request.kind, request.giver, arrow, request.receiver)
}
