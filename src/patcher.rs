use crate::error::{PatchError, Result};
use crate::ilst::Tag;
use crate::options::WriteOptions;
use crate::plan::RewritePlan;
use crate::tree::BoxTree;
use crate::util::copy_chunked;
use crate::verify::WriteVerifier;
use std::io::{Read, Seek, SeekFrom, Write};

/// Writes a new `ilst` into a copy of an MP4 file, touching as few bytes as
/// the available padding allows.
///
/// The source is only ever read. The destination should be empty; it holds a
/// complete file only when a call returns `Ok`, otherwise it is to be thrown
/// away. Both streams are taken by value and dropped before returning, pass
/// `&mut` handles to keep them.
#[derive(Debug, Clone, Default)]
pub struct ContainerPatcher {
    options: WriteOptions,
}

impl ContainerPatcher {
    pub fn new(options: WriteOptions) -> Self {
        ContainerPatcher { options }
    }

    pub fn rewrite<R, W>(&self, tag: &Tag, source: R, destination: W) -> Result<()>
    where
        R: Read + Seek,
        W: Read + Write + Seek,
    {
        self.rewrite_ilst(&tag.to_ilst(), source, destination)
    }

    /// Rewrite with an empty tag: the `ilst` stays, with no items in it.
    pub fn clear<R, W>(&self, source: R, destination: W) -> Result<()>
    where
        R: Read + Seek,
        W: Read + Write + Seek,
    {
        self.rewrite(&Tag::new(), source, destination)
    }

    /// Rewrite with an already serialized `ilst` box.
    pub fn rewrite_ilst<R, W>(&self, ilst: &[u8], mut source: R, mut destination: W) -> Result<()>
    where
        R: Read + Seek,
        W: Read + Write + Seek,
    {
        tracing::debug!(ilst_len = ilst.len(), "started writing tag data");
        let tree = BoxTree::read(&mut source)?;
        let plan = RewritePlan::build(&tree, ilst)?;

        let written = self.stream(&plan, tree.file_len, &mut source, &mut destination)?;
        drop(source);
        if written != plan.output_len {
            return Err(PatchError::ShortTransfer { expected: plan.output_len, actual: written });
        }
        destination.flush()?;

        destination.seek(SeekFrom::Start(0))?;
        if let Err(failure) = WriteVerifier::new(&tree).verify(&mut destination) {
            tracing::warn!(%failure, "rejecting written file");
            return Err(failure.into());
        }
        tracing::info!(strategy = ?plan.decision.strategy, bytes = written, "tag written");
        Ok(())
    }

    /// Copy the source to the destination, applying the plan's edits in order.
    fn stream<R, W>(&self, plan: &RewritePlan, file_len: u64, src: &mut R, dst: &mut W) -> Result<u64>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        let chunk_size = self.options.chunk_size;
        src.seek(SeekFrom::Start(0))?;
        dst.seek(SeekFrom::Start(0))?;

        let mut pos = 0u64;
        let mut written = 0u64;
        for edit in &plan.edits {
            written += copy_chunked(src, dst, edit.start - pos, chunk_size)?;
            dst.write_all(&edit.bytes)?;
            written += edit.bytes.len() as u64;
            if edit.end != edit.start {
                src.seek(SeekFrom::Start(edit.end))?;
            }
            pos = edit.end;
        }
        written += copy_chunked(src, dst, file_len - pos, chunk_size)?;
        Ok(written)
    }
}
