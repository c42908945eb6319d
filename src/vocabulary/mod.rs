/*!
 * Vocabulary extraction core.
 *
 * - `prompts`: prompt text and the parsers for the answers it asks for
 * - `extraction`: provider calls under the rotating-credential policy
 * - `reconciler`: known-word filtering and row building
 * - `pipeline`: one subtitle-to-vocabulary run built from the above
 */

pub mod extraction;
pub mod pipeline;
pub mod prompts;
pub mod reconciler;

pub use extraction::{DEFAULT_MEANING_BATCH_SIZE, ExtractionClient};
pub use pipeline::{RefetchSummary, ReviewBatch, RunSummary, VocabularyPipeline};
pub use prompts::WordMeaning;
pub use reconciler::{MEANING_NOT_FOUND, build_word_rows, decode_meaning, filter_against_known, needs_meaning_refetch};
