use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::domain::{DataPortal, Format};

/// Characters that would end or split a query parameter.
const QUERY_PARAM: &AsciiSet = &CONTROLS.add(b'&').add(b'#').add(b'%').add(b'+');

/// Joins the API prefix and a relative endpoint, inserting exactly one `/`.
pub fn endpoint_url(prefix: &str, endpoint: &str) -> String {
    let mut url = prefix.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(endpoint.trim_start_matches('/'));
    url
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub result_type: String,
    pub data_portal: DataPortal,
    pub format: Format,
    pub limit: Option<usize>,
    pub query: Option<String>,
    pub fields: Vec<String>,
}

/// The relative endpoints of the portal API used by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Results {
        data_portal: DataPortal,
        format: Format,
    },
    SearchFields {
        data_portal: DataPortal,
        format: Format,
        result_type: String,
    },
    ReturnFields {
        data_portal: DataPortal,
        format: Format,
        result_type: String,
    },
    Search(SearchRequest),
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Endpoint::Results {
                data_portal,
                format,
            } => format!("results?dataPortal={data_portal}&format={format}"),
            Endpoint::SearchFields {
                data_portal,
                format,
                result_type,
            } => format!(
                "searchFields?dataPortal={data_portal}&format={format}&result={result_type}"
            ),
            Endpoint::ReturnFields {
                data_portal,
                format,
                result_type,
            } => format!(
                "returnFields?dataPortal={data_portal}&format={format}&result={result_type}"
            ),
            Endpoint::Search(request) => {
                let mut path = format!(
                    "search?result={}&dataPortal={}&format={}",
                    request.result_type, request.data_portal, request.format
                );
                if let Some(limit) = request.limit {
                    path.push_str(&format!("&limit={limit}"));
                }
                if let Some(query) = request.query.as_deref().filter(|q| !q.is_empty()) {
                    path.push_str(&format!("&query=\"{}\"", escape(query)));
                }
                if !request.fields.is_empty() {
                    let fields = request
                        .fields
                        .iter()
                        .map(|field| escape(field))
                        .collect::<Vec<_>>();
                    path.push_str(&format!("&fields={}", fields.join(",")));
                }
                path
            }
        }
    }

    pub fn url(&self, prefix: &str) -> String {
        endpoint_url(prefix, &self.path())
    }
}

fn escape(value: &str) -> String {
    utf8_percent_encode(value, QUERY_PARAM).to_string()
}
