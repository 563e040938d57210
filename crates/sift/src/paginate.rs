//! Pagination strategies.
//!
//! Two styles, selected by configuration at startup: offset/limit
//! (the default) and page-number/page-size. An explicit limit passed by
//! the caller overrides whatever the query string says.

use serde::Deserialize;

use crate::config::EngineConfig;
use crate::error::QueryResult;
use crate::params::Params;
use crate::plan::PageRequest;

/// Pagination style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStyle {
    #[default]
    Offset,
    Page,
}

/// Applies the configured pagination strategy to request parameters.
#[derive(Debug, Clone, Copy)]
pub struct Paginator<'a> {
    config: &'a EngineConfig,
}

impl<'a> Paginator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Resolve the pagination directive for one request.
    pub fn page_request(
        &self,
        params: &Params,
        explicit_limit: Option<u64>,
    ) -> QueryResult<PageRequest> {
        let names = &self.config.pagination;
        let limit = match explicit_limit {
            Some(limit) => limit,
            None => params
                .unsigned(&names.limit_param)?
                .unwrap_or(self.config.default_limit),
        };

        match names.style {
            PageStyle::Offset => {
                let offset = params.unsigned(&names.offset_param)?.unwrap_or(0);
                Ok(PageRequest::Offset { offset, limit })
            }
            PageStyle::Page => {
                let number = params.unsigned(&names.page_param)?.unwrap_or(1);
                Ok(PageRequest::Page { number, size: limit })
            }
        }
    }
}
