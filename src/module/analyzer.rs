//! Response analyzer driving an ordered list of parsers.
//!
//! Every parser sees the same body through a fresh replay reader, and any
//! derived request whose depth disagrees with `response depth + 1` is
//! restamped before it leaves the analyzer.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::module::base::{CalculateScore, Counts, ModuleBase};
use crate::module::data::{DataItem, ReplayableResponse, Response};
use crate::module::mid::Mid;
use crate::module::{Analyzer, Module, ModuleSummary, ParseResponse};

/// An [`Analyzer`] that fans a replayable response out to its parsers and
/// merges their outputs.
pub struct ParserAnalyzer {
    base: ModuleBase,
    parsers: Vec<ParseResponse>,
}

impl std::fmt::Debug for ParserAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserAnalyzer")
            .field("base", &self.base)
            .field("parsers", &self.parsers.len())
            .finish()
    }
}

impl ParserAnalyzer {
    /// Creates an analyzer over a non-empty parser list.
    pub fn new(
        mid: Mid,
        parsers: Vec<ParseResponse>,
        calculator: Option<CalculateScore>,
    ) -> Result<Self> {
        if parsers.is_empty() {
            return Err(Error::illegal_parameter("empty response parser list"));
        }
        Ok(ParserAnalyzer {
            base: ModuleBase::new(mid, calculator),
            parsers,
        })
    }

    pub fn parser_count(&self) -> usize {
        self.parsers.len()
    }
}

impl Module for ParserAnalyzer {
    fn id(&self) -> &Mid {
        self.base.mid()
    }

    fn addr(&self) -> String {
        self.base.addr()
    }

    fn score(&self) -> u64 {
        self.base.score()
    }

    fn set_score(&self, score: u64) {
        self.base.set_score(score)
    }

    fn score_calculator(&self) -> CalculateScore {
        self.base.score_calculator()
    }

    fn counts(&self) -> Counts {
        self.base.counts()
    }

    fn summary(&self) -> ModuleSummary {
        self.base.summary()
    }
}

#[async_trait]
impl Analyzer for ParserAnalyzer {
    async fn analyze(&self, resp: Response) -> (Vec<DataItem>, Vec<Error>) {
        let _in_flight = self.base.in_flight_guard();
        self.base.incr_called();
        self.base.incr_accepted();
        let depth = resp.depth();
        debug!(url = %resp.url(), depth, "analyzing response");

        let replayable = ReplayableResponse::from(resp);
        let mut data = Vec::new();
        let mut errors = Vec::new();
        for parser in &self.parsers {
            let (parsed, parse_errors) = parser(&replayable, depth);
            for datum in parsed {
                data.push(stamp_depth(datum, depth));
            }
            errors.extend(parse_errors);
        }
        if errors.is_empty() {
            self.base.incr_completed();
        }
        (data, errors)
    }
}

/// Forces derived requests onto the depth that follows `resp_depth`.
fn stamp_depth(datum: DataItem, resp_depth: u32) -> DataItem {
    match datum {
        DataItem::Request(req) if req.depth() != resp_depth + 1 => {
            DataItem::Request(req.at_depth(resp_depth + 1))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::data::{Item, Request};
    use crate::module::ModuleType;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};
    use std::io::Read;
    use url::Url;

    fn mid() -> Mid {
        Mid::new(ModuleType::Analyzer, 1, None)
    }

    fn response(body: &'static [u8], depth: u32) -> Response {
        Response::new(
            Url::parse("http://a.test/").unwrap(),
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(body),
            depth,
        )
    }

    #[test]
    fn empty_parser_list_rejected() {
        let err = ParserAnalyzer::new(mid(), Vec::new(), None).unwrap_err();
        assert!(matches!(err, Error::IllegalParameter(_)));
    }

    #[tokio::test]
    async fn all_parsers_see_identical_bytes() {
        let make_parser = || -> ParseResponse {
            Box::new(|resp: &ReplayableResponse, _depth| {
                let mut body = String::new();
                resp.body_reader().read_to_string(&mut body).unwrap();
                let item = Item::new().with("body", body);
                (vec![DataItem::Item(item)], Vec::new())
            })
        };
        let analyzer =
            ParserAnalyzer::new(mid(), vec![make_parser(), make_parser()], None).unwrap();
        let (data, errors) = analyzer.analyze(response(b"shared body", 0)).await;
        assert!(errors.is_empty());
        assert_eq!(data.len(), 2);
        for datum in data {
            match datum {
                DataItem::Item(item) => {
                    assert_eq!(
                        item.get("body"),
                        Some(&crate::module::FieldValue::Text("shared body".into()))
                    );
                }
                DataItem::Request(_) => panic!("expected items"),
            }
        }
    }

    #[tokio::test]
    async fn derived_requests_are_restamped() {
        let parser: ParseResponse = Box::new(|_resp, _depth| {
            let wrong_depth = Request::new(Url::parse("http://a.test/next").unwrap(), 9);
            (vec![DataItem::Request(wrong_depth)], Vec::new())
        });
        let analyzer = ParserAnalyzer::new(mid(), vec![parser], None).unwrap();
        let (data, _) = analyzer.analyze(response(b"", 3)).await;
        match &data[0] {
            DataItem::Request(req) => assert_eq!(req.depth(), 4),
            DataItem::Item(_) => panic!("expected a request"),
        }
    }

    #[tokio::test]
    async fn parser_errors_suppress_completion() {
        let failing: ParseResponse = Box::new(|_resp, _depth| {
            (Vec::new(), vec![Error::analyzer("unparseable markup")])
        });
        let analyzer = ParserAnalyzer::new(mid(), vec![failing], None).unwrap();
        let (data, errors) = analyzer.analyze(response(b"", 0)).await;
        assert!(data.is_empty());
        assert_eq!(errors.len(), 1);
        let counts = analyzer.counts();
        assert_eq!(counts.called, 1);
        assert_eq!(counts.accepted, 1);
        assert_eq!(counts.completed, 0);
    }

    #[tokio::test]
    async fn clean_analysis_completes() {
        let parser: ParseResponse = Box::new(|_resp, _depth| (Vec::new(), Vec::new()));
        let analyzer = ParserAnalyzer::new(mid(), vec![parser], None).unwrap();
        analyzer.analyze(response(b"", 0)).await;
        analyzer.analyze(response(b"", 0)).await;
        let counts = analyzer.counts();
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.in_flight, 0);
    }
}
