//! Face commands: registration, verified reveal and face-data backups.

use std::path::Path;

use anyhow::{Context, Result};
use secret_gift_ops::{OpsContext, RegisterRequest, RevealRequest};
use tracing::debug;

/// Register a participant's face from a file.
pub fn register(ctx: &OpsContext, root: &Path, name: &str, file: &Path) -> Result<()> {
    let bytes = read_face(file)?;
    let response = ctx.register(root, &RegisterRequest::image(name, bytes))?;
    println!("📸 Registered face for {}", response.name);
    println!("   Registered faces: {}", response.registered_faces);
    Ok(())
}

/// Verify a face and reveal the recipient.
pub fn reveal(ctx: &OpsContext, root: &Path, name: &str, file: &Path) -> Result<()> {
    let bytes = read_face(file)?;
    let response = ctx.reveal(root, &RevealRequest::image(name, bytes))?;
    println!("✅ Identity verified: {}", response.name);
    println!("🎁 You are giving a gift to: {}", response.recipient);
    Ok(())
}

/// Write a face-data backup.
pub fn export(ctx: &OpsContext, root: &Path, dir: Option<&Path>) -> Result<()> {
    let response = ctx.export_faces(root, dir)?;
    println!("💾 Exported {} faces to {}", response.faces, response.path.display());
    Ok(())
}

/// Restore face data from a backup.
pub fn import(ctx: &OpsContext, root: &Path, file: &Path) -> Result<()> {
    let response = ctx
        .import_faces(root, file)
        .with_context(|| format!("Failed to import face data from {}", file.display()))?;
    println!("📥 Imported {} faces", response.imported);
    for name in &response.dropped {
        println!("   ⚠️  Skipped {} (not a participant)", name);
    }
    Ok(())
}

/// List face-data backups.
pub fn list(ctx: &OpsContext, root: &Path) -> Result<()> {
    let backups = ctx.list_backups(root)?;
    if backups.is_empty() {
        println!("No backups in {}", root.join(secret_gift_ops::GIFT_DIR).display());
    }
    for path in backups {
        println!("{}", path.display());
    }
    Ok(())
}

fn read_face(file: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    debug!(path = %file.display(), bytes = bytes.len(), "Read face file");
    Ok(bytes)
}
