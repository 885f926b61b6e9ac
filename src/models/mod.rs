pub mod matching;
pub mod record;
pub mod rfq;
pub mod search;

pub use matching::{
    derive_mock_response, CustomerDetails, MainRow, MatchData, MatchingRequestGroup,
    ResponseView, RfqSummary, VendorMatchEntry,
};
pub use record::{get_field_value, resolve_field, safe_value, VendorProductRecord};
pub use rfq::{BulkOutcome, OfferPayload, RfqKey, RfqPayload, RfqStatus};
pub use search::SearchResultRecord;
