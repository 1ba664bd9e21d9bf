//! Blocking file helpers used by the local repository.

use std::fs;
use std::io;
use std::path::Path;

/// Move `staged` over `target`, replacing any existing file.
///
/// `fs::rename` refuses to replace an existing file on some platforms, so a
/// failed first attempt removes `target` and tries once more. When the second
/// attempt fails too, the staged file is removed so no temp files pile up in
/// the store directory.
pub fn replace_file(staged: &Path, target: &Path) -> io::Result<()> {
    let first = match fs::rename(staged, target) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    if !staged.exists() {
        return Err(first);
    }
    let _ = fs::remove_file(target);
    fs::rename(staged, target).map_err(|second| {
        let _ = fs::remove_file(staged);
        io::Error::new(
            second.kind(),
            format!("Could not replace {}: {} (then {})", target.display(), first, second),
        )
    })
}
