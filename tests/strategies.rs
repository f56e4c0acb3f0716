mod common;

use common::*;
use mp4patch::offsets::OffsetWidth;
use mp4patch::{Strategy, Tag, ilst::keys, preview};
use pretty_assertions::assert_eq;
use std::io::Cursor;

fn strategy(src: &[u8], tag: &Tag) -> Strategy {
    preview(&mut Cursor::new(src), tag).unwrap().decision.strategy
}

#[test]
fn same_size_tag_is_written_in_place() {
    let fx = Fixture::default();
    let src = fx.build();

    let same = fx.ilst.clone().unwrap();
    assert_eq!(strategy(&src, &same), Strategy::Equal);
    assert_eq!(patch(&src, &same).unwrap(), src);

    let mut other = Tag::new();
    other.set_text(keys::TITLE, "b".repeat(68));
    let out = patch(&src, &other).unwrap();
    assert_eq!(out.len(), src.len());
    assert_eq!(tree(&out).moov, tree(&src).moov);
    assert_consistent(&src, &out, &other);
}

#[test]
fn shrink_grows_following_padding() {
    let src = Fixture { meta_padding: Some(20), ..Default::default() }.build();
    let tag = tag_of_len(60);
    assert_eq!(strategy(&src, &tag), Strategy::ShrinkWithPadding);

    let out = patch(&src, &tag).unwrap();
    assert_eq!(out.len(), src.len());
    assert_eq!(tree(&out).meta_padding.unwrap().size, 60);
    assert_eq!(first_offset(&out), first_offset(&src));
    assert_consistent(&src, &out, &tag);
}

#[test]
fn shrink_leaves_new_padding_behind() {
    let src = Fixture::default().build();
    for (len, pad) in [(60, 40), (91, 9)] {
        let tag = tag_of_len(len);
        assert_eq!(strategy(&src, &tag), Strategy::ShrinkNewPadding);

        let out = patch(&src, &tag).unwrap();
        assert_eq!(out.len(), src.len());
        assert_eq!(tree(&out).meta_padding.unwrap().size, pad);
        assert_eq!(tree(&out).moov, tree(&src).moov);
        assert_consistent(&src, &out, &tag);
    }
}

#[test]
fn shrink_too_small_for_padding_shrinks_ancestors() {
    let src = Fixture::default().build();
    let old = tree(&src);
    for saved in [5u64, 8] {
        let tag = tag_of_len(100 - saved as usize);
        assert_eq!(strategy(&src, &tag), Strategy::ShrinkNoPadding);

        let out = patch(&src, &tag).unwrap();
        let new = tree(&out);
        assert_eq!(out.len() as u64, src.len() as u64 - saved);
        assert_eq!(new.moov.size, old.moov.size - saved);
        assert_eq!(new.udta.unwrap().size, old.udta.clone().unwrap().size - saved);
        assert_eq!(new.meta.unwrap().size, old.meta.clone().unwrap().size - saved);
        assert_eq!(new.meta_padding, None);
        assert_eq!(first_offset(&out), first_offset(&src) - saved);
        assert_consistent(&src, &out, &tag);
    }
}

#[test]
fn growth_absorbed_by_padding() {
    let src = Fixture { meta_padding: Some(80), ..Default::default() }.build();
    let tag = tag_of_len(150);
    assert_eq!(strategy(&src, &tag), Strategy::GrowWithPadding);

    let out = patch(&src, &tag).unwrap();
    assert_eq!(out.len(), src.len());
    assert_eq!(tree(&out).meta_padding.unwrap().size, 30);
    assert_consistent(&src, &out, &tag);
}

#[test]
fn growth_consumes_padding_exactly() {
    let src = Fixture { meta_padding: Some(50), ..Default::default() }.build();
    let tag = tag_of_len(150);
    assert_eq!(strategy(&src, &tag), Strategy::GrowWithPadding);

    let out = patch(&src, &tag).unwrap();
    let new = tree(&out);
    assert_eq!(out.len(), src.len());
    assert_eq!(new.meta_padding, None);
    assert_eq!(new.meta, tree(&src).meta);
    assert_consistent(&src, &out, &tag);
}

#[test]
fn overflow_moves_payload_past_padding_before_moov() {
    let src = Fixture {
        meta_padding: Some(20),
        free_before_moov: Some(64),
        first_offset: Some(4096),
        ..Default::default()
    }
    .build();
    assert_eq!(first_offset(&src), 4096);
    let tag = tag_of_len(150);
    assert_eq!(strategy(&src, &tag), Strategy::GrowOverflowMustMove);

    let out = patch(&src, &tag).unwrap();
    let (old, new) = (tree(&src), tree(&out));
    assert_eq!(out.len(), src.len() + 30);
    assert_eq!(new.moov.size, old.moov.size + 30);
    assert_eq!(new.udta.unwrap().size, old.udta.unwrap().size + 30);
    assert_eq!(new.meta.unwrap().size, old.meta.unwrap().size + 30);
    assert_eq!(new.meta_padding, None);
    assert_eq!(new.top_padding[0].size, 64);
    assert_eq!(first_offset(&out), 4126);
    assert_consistent(&src, &out, &tag);
}

#[test]
fn overflow_taken_from_padding_after_moov() {
    let src = Fixture {
        meta_padding: Some(20),
        free_after_moov: Some(100),
        first_offset: Some(4096),
        ..Default::default()
    }
    .build();
    let tag = tag_of_len(150);
    assert_eq!(strategy(&src, &tag), Strategy::GrowOverflowTopPaddingFits);

    let out = patch(&src, &tag).unwrap();
    let new = tree(&out);
    assert_eq!(out.len(), src.len());
    assert_eq!(new.moov.size, tree(&src).moov.size + 30);
    assert_eq!(new.usable_top_padding().unwrap().size, 70);
    assert_eq!(first_offset(&out), 4096);
    assert_consistent(&src, &out, &tag);
}

#[test]
fn overflow_equal_to_top_padding_drops_it() {
    let src = Fixture {
        meta_padding: Some(20),
        free_after_moov: Some(30),
        first_offset: Some(4096),
        ..Default::default()
    }
    .build();
    let tag = tag_of_len(150);
    assert_eq!(strategy(&src, &tag), Strategy::GrowOverflowTopPaddingExact);

    let out = patch(&src, &tag).unwrap();
    assert_eq!(out.len(), src.len());
    assert!(tree(&out).top_padding.is_empty());
    assert_eq!(first_offset(&out), 4096);
    assert_consistent(&src, &out, &tag);
}

#[test]
fn top_padding_one_byte_over_cannot_be_split() {
    let src = Fixture {
        meta_padding: Some(20),
        free_after_moov: Some(31),
        first_offset: Some(4096),
        ..Default::default()
    }
    .build();
    let tag = tag_of_len(150);
    assert_eq!(strategy(&src, &tag), Strategy::GrowOverflowMustMove);

    let out = patch(&src, &tag).unwrap();
    assert_eq!(out.len(), src.len() + 30);
    assert_eq!(tree(&out).usable_top_padding().unwrap().size, 31);
    assert_eq!(first_offset(&out), 4126);
    assert_consistent(&src, &out, &tag);
}

#[test]
fn padding_just_short_of_a_header_shrinks_moov() {
    // 10 extra bytes against 14 of padding: the 4 left over cannot be a box
    let tag = tag_of_len(110);

    let src = Fixture { meta_padding: Some(14), free_after_moov: Some(20), ..Default::default() }.build();
    assert_eq!(strategy(&src, &tag), Strategy::GrowOverflowTopPaddingFits);
    let out = patch(&src, &tag).unwrap();
    assert_eq!(out.len(), src.len());
    assert_eq!(tree(&out).moov.size, tree(&src).moov.size - 4);
    assert_eq!(tree(&out).usable_top_padding().unwrap().size, 24);
    assert_consistent(&src, &out, &tag);

    let src = Fixture { meta_padding: Some(14), ..Default::default() }.build();
    assert_eq!(strategy(&src, &tag), Strategy::GrowOverflowMustMove);
    let out = patch(&src, &tag).unwrap();
    assert_eq!(out.len(), src.len() - 4);
    assert_eq!(first_offset(&out), first_offset(&src) - 4);
    assert_consistent(&src, &out, &tag);
}

#[test]
fn payload_before_moov_keeps_its_offsets() {
    let src = Fixture { payload_first: true, ..Default::default() }.build();
    let tag = tag_of_len(150);
    assert_eq!(strategy(&src, &tag), Strategy::GrowOverflowMustMove);

    let out = patch(&src, &tag).unwrap();
    assert_eq!(out.len(), src.len() + 50);
    assert_eq!(tree(&out).mdat.start, tree(&src).mdat.start);
    assert_eq!(first_offset(&out), first_offset(&src));
    assert_consistent(&src, &out, &tag);

    let shrunk = patch(&src, &tag_of_len(95)).unwrap();
    assert_eq!(first_offset(&shrunk), first_offset(&src));
}

#[test]
fn every_offset_of_wide_tables_moves() {
    let src = Fixture { co64: true, ..Default::default() }.build();
    let tag = tag_of_len(95);
    let out = patch(&src, &tag).unwrap();

    let (old, new) = (tree(&src), tree(&out));
    assert_eq!(new.offset_tables[0].width, OffsetWidth::Co64);
    let expected: Vec<u64> = old.offset_tables[0].offsets.iter().map(|o| o - 5).collect();
    assert_eq!(new.offset_tables[0].offsets, expected);
    assert_consistent(&src, &out, &tag);
}

#[test]
fn clearing_keeps_an_empty_ilst() {
    let src = Fixture::default().build();
    let mut dst = Cursor::new(Vec::new());
    mp4patch::clear(Cursor::new(&src[..]), &mut dst).unwrap();
    let out = dst.into_inner();

    assert_eq!(out.len(), src.len());
    assert_eq!(tree(&out).ilst.unwrap().size, 8);
    assert_eq!(tree(&out).meta_padding.unwrap().size, 92);
    assert!(tag_in(&out).is_empty());
}

#[test]
fn padding_after_mdat_is_never_used() {
    let src = Fixture {
        meta_padding: Some(20),
        free_after_mdat: Some(200),
        first_offset: Some(4096),
        ..Default::default()
    }
    .build();
    assert!(tree(&src).usable_top_padding().is_none());
    let tag = tag_of_len(150);
    assert_eq!(strategy(&src, &tag), Strategy::GrowOverflowMustMove);

    let out = patch(&src, &tag).unwrap();
    assert_eq!(out.len(), src.len() + 30);
    assert_eq!(first_offset(&out), 4126);
    assert_eq!(out[out.len() - 200..], free(200)[..]);
    assert_consistent(&src, &out, &tag);
}

#[test]
fn every_track_table_moves_by_the_same_delta() {
    let src = Fixture { tracks: 3, meta_padding: Some(20), ..Default::default() }.build();
    let tag = tag_of_len(150);
    let out = patch(&src, &tag).unwrap();

    let (old, new) = (tree(&src), tree(&out));
    assert_eq!(old.offset_tables.len(), 3);
    assert_eq!(new.offset_tables.len(), 3);
    for (before, after) in old.offset_tables.iter().zip(&new.offset_tables) {
        let expected: Vec<u64> = before.offsets.iter().map(|o| o + 30).collect();
        assert_eq!(after.offsets, expected);
    }
    assert_consistent(&src, &out, &tag);
}
