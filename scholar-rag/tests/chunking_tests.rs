//! Property tests for chunk coverage and bounds.

use proptest::prelude::*;
use scholar_rag::chunking::{Chunker, FixedSizeChunker, SentenceChunker};
use scholar_rag::document::{Chunk, Document};

/// Chunk size and an overlap strictly below it.
fn arb_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..60).prop_flat_map(|size| (Just(size), 0..size))
}

/// Every character of `text` lies in at least one chunk, every chunk fits
/// in `size`, and every chunk's text is the slice its offsets name.
fn check_chunks(text: &str, size: usize, chunks: &[Chunk]) -> Result<(), TestCaseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut covered = vec![false; chars.len()];

    for chunk in chunks {
        prop_assert!(chunk.start_offset < chunk.end_offset);
        prop_assert!(chunk.end_offset <= chars.len());
        prop_assert!(chunk.char_len() <= size, "chunk of {} > {size}", chunk.char_len());
        let slice: String = chars[chunk.start_offset..chunk.end_offset].iter().collect();
        prop_assert_eq!(&chunk.text, &slice);
        covered[chunk.start_offset..chunk.end_offset].iter_mut().for_each(|c| *c = true);
    }

    prop_assert!(covered.iter().all(|c| *c), "uncovered characters in {text:?}");
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn fixed_chunks_cover_every_character(
        text in "[a-zé .\n]{0,300}",
        (size, overlap) in arb_params(),
    ) {
        let chunker = FixedSizeChunker::new(size, overlap).unwrap();
        let chunks = chunker.chunk(&Document::new("d", &text));
        prop_assert_eq!(chunks.is_empty(), text.is_empty());
        check_chunks(&text, size, &chunks)?;

        let starts: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
        prop_assert!(starts.windows(2).all(|w| w[1] - w[0] == size - overlap));
    }

    #[test]
    fn sentence_chunks_cover_every_character(
        text in "[a-zé .!?\n]{0,300}",
        (size, overlap) in arb_params(),
    ) {
        let chunker = SentenceChunker::new(size, overlap).unwrap();
        let chunks = chunker.chunk(&Document::new("d", &text));
        prop_assert_eq!(chunks.is_empty(), text.is_empty());
        check_chunks(&text, size, &chunks)?;
    }

    #[test]
    fn short_documents_are_one_chunk(
        text in "[a-z ]{1,40}",
        overlap in 0usize..10,
    ) {
        let chunks = FixedSizeChunker::new(40, overlap).unwrap().chunk(&Document::new("d", &text));
        prop_assert_eq!(chunks.len(), 1);
        prop_assert_eq!(&chunks[0].text, &text);
        prop_assert_eq!(chunks[0].id.as_str(), "d_0");
    }
}
