//! Fact extraction from page content.

mod extractor;

pub use extractor::{
    ExtractionResult, HeuristicExtractor, IntelExtractor, RankedLink, Verification,
};
