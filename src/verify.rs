use crate::error::{PatchError, VerifyFailure};
use crate::tree::BoxTree;
use std::io::{Read, Seek};

/// Re-reads a freshly written file and compares it with the tree of the
/// file it was written from.
pub struct WriteVerifier<'a> {
    original: &'a BoxTree,
}

impl<'a> WriteVerifier<'a> {
    pub fn new(original: &'a BoxTree) -> Self {
        WriteVerifier { original }
    }

    pub fn verify<R: Read + Seek>(&self, written: &mut R) -> Result<BoxTree, VerifyFailure> {
        tracing::debug!("checking file has been written correctly");

        let tree = match BoxTree::read(written) {
            Ok(tree) => tree,
            Err(PatchError::NoPayloadFound) => return Err(VerifyFailure::MissingPayload),
            Err(e) => return Err(VerifyFailure::Unparseable(e.to_string())),
        };

        if tree.mdat.size != self.original.mdat.size {
            return Err(VerifyFailure::PayloadLengthMismatch {
                expected: self.original.mdat.size,
                actual: tree.mdat.size,
            });
        }
        if tree.udta.is_none() {
            return Err(VerifyFailure::MissingUserData);
        }
        if tree.meta.is_none() {
            return Err(VerifyFailure::MissingMetadata);
        }

        if let Some(old_first) = self.original.first_offset() {
            let new_first = tree.first_offset().ok_or(VerifyFailure::MissingOffsets)?;
            let old_diff = old_first as i64 - self.original.mdat.start as i64;
            let new_diff = new_first as i64 - tree.mdat.start as i64;
            tracing::trace!(old_first, old_diff, new_first, new_diff, "chunk offset check");
            if new_diff != old_diff {
                return Err(VerifyFailure::OffsetMismatch { discrepancy: new_diff - old_diff });
            }
        }

        tracing::debug!("file has been written correctly");
        Ok(tree)
    }
}
