/**
 * Patch Application
 *
 * A patch is a structured diff against a base text: at a byte offset,
 * delete an expected run of text and insert a replacement. Patches apply
 * sequentially, and application is all-or-nothing: if any patch in a set
 * fails to match the base it targets, the whole set is rejected and the
 * caller's content is left untouched.
 *
 * # Matching Rule
 *
 * A patch applies cleanly iff `base[start .. start + delete.len()]`
 * equals `delete` exactly and both ends of that range fall on UTF-8
 * character boundaries. Pure insertions use an empty `delete`.
 *
 * # Convergence
 *
 * The engine broadcasts accepted patch sets, not merged content. Every
 * room member applies the identical sequence against the identical base,
 * so all replicas converge on the same result.
 */

use crate::error::SyncError;
use serde::{Deserialize, Serialize};

/// A single insert/delete range against a base text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPatch {
    /// Byte offset into the base text where the patch applies
    pub start: usize,
    /// Exact text expected at `start`, removed by the patch (may be empty)
    #[serde(default)]
    pub delete: String,
    /// Replacement text inserted at `start` (may be empty)
    #[serde(default)]
    pub insert: String,
}

impl TextPatch {
    /// Apply this patch to `base`, returning the new text
    ///
    /// `index` identifies the patch within its set for error reporting.
    fn apply(&self, base: &str, index: usize) -> Result<String, SyncError> {
        let end = self.start.checked_add(self.delete.len()).ok_or_else(|| {
            SyncError::patch_apply(index, "patch range overflows")
        })?;

        if end > base.len() {
            return Err(SyncError::patch_apply(
                index,
                format!(
                    "patch range {}..{} exceeds content length {}",
                    self.start,
                    end,
                    base.len()
                ),
            ));
        }
        if !base.is_char_boundary(self.start) || !base.is_char_boundary(end) {
            return Err(SyncError::patch_apply(
                index,
                "patch range splits a UTF-8 character",
            ));
        }
        if &base[self.start..end] != self.delete {
            return Err(SyncError::patch_apply(index, "base text mismatch"));
        }

        let mut next = String::with_capacity(base.len() - self.delete.len() + self.insert.len());
        next.push_str(&base[..self.start]);
        next.push_str(&self.insert);
        next.push_str(&base[end..]);
        Ok(next)
    }
}

/// Apply a patch set sequentially against `base`
///
/// Each patch applies against the text produced by its predecessors. On
/// the first failure the whole operation is rejected; the caller must not
/// persist anything. On success returns the fully patched text.
pub fn apply_patches(base: &str, patches: &[TextPatch]) -> Result<String, SyncError> {
    let mut content = base.to_string();
    for (index, patch) in patches.iter().enumerate() {
        content = patch.apply(&content, index)?;
    }
    Ok(content)
}
