use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::utils::html::value_by_id;

// The ASP.NET Web Forms hidden fields a page carries forward to the next
// postback. Any of them may be missing depending on the district.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub viewstate: Option<String>,
    pub event_validation: Option<String>,
    pub event_target: Option<String>,
    pub event_argument: Option<String>,
}

impl PageState {
    // Reads each hidden field by element id.
    pub fn extract(doc: &Html) -> PageState {
        PageState {
            viewstate: value_by_id(doc, "__VIEWSTATE"),
            event_validation: value_by_id(doc, "__EVENTVALIDATION"),
            event_target: value_by_id(doc, "__EVENTTARGET"),
            event_argument: value_by_id(doc, "__EVENTARGUMENT"),
        }
    }

    pub fn from_html(html: &str) -> PageState {
        Self::extract(&Html::parse_document(html))
    }
}
