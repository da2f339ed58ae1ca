//! Human-readable run results.

use std::fmt::Write;
use std::path::Path;

use newsfaces::MappingLedger;

/// Image paths listed individually before summarising the rest.
const MAX_LISTED_IMAGES: usize = 40;

/// Render statistics and the locations of stored assets.
pub fn render(ledger: &MappingLedger, root: &Path) -> String {
    let stats = ledger.statistics();
    let html_dir = absolute(&root.join("html"));
    let images_dir = absolute(&root.join("images"));
    let rule = "=".repeat(40);

    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, " RESULTS");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Web pages found: {}", stats.pages_processed);
    let _ = writeln!(out, "Images found: {}", stats.images_discovered);
    let _ = writeln!(out, "Images saved: {}", stats.images_downloaded);
    let _ = writeln!(out);
    let _ = writeln!(out, " HTML files: file://{}", html_dir.display());
    let _ = writeln!(out, " Images: file://{}", images_dir.display());
    let _ = writeln!(out, " Ledger: file://{}", absolute(ledger.path()).display());
    let _ = writeln!(out);

    let images: Vec<_> = ledger
        .pages()
        .iter()
        .flat_map(|page| page.downloaded_images.iter())
        .collect();

    if images.is_empty() {
        let _ = writeln!(out, " No images were downloaded");
    } else {
        let _ = writeln!(out, " Downloaded images:");
        for image in images.iter().take(MAX_LISTED_IMAGES) {
            let _ = writeln!(out, "   file://{}", images_dir.join(&image.filename).display());
        }
        if images.len() > MAX_LISTED_IMAGES {
            let _ = writeln!(
                out,
                "   ... and {} more images in the folder",
                images.len() - MAX_LISTED_IMAGES
            );
        }
    }
    let _ = write!(out, "{rule}");

    out
}

fn absolute(path: &Path) -> std::path::PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}
