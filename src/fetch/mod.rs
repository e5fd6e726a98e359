// src/fetch/mod.rs

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

pub mod http;
pub mod policy;
pub mod query;

pub use http::{HttpTransport, Reply, Transport};
pub use policy::{log_decision, Decision, FailurePolicy, FetchFailure, OnFailure};
pub use query::{build_url, parse_response, QueryKey};

use crate::period::Period;
use crate::schema::{CommodityCode, FieldSchema, RawRecord};

/// A query that produced nothing because it failed and the policy said skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedQuery {
    pub key: QueryKey,
    pub reason: FetchFailure,
}

/// A query failed under the `abort` policy.
#[derive(Debug, Clone, Error)]
#[error("query {key} failed: {reason}")]
pub struct FetchAborted {
    pub key: QueryKey,
    pub reason: FetchFailure,
}

/// Everything one `fetch` call gathered for a (period, direction).
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Data rows of every successful query, in request order.
    pub rows: Vec<RawRecord>,
    pub skipped: Vec<SkippedQuery>,
    /// Queries the API answered with "no content".
    pub empty: Vec<QueryKey>,
}

enum Terminal {
    Skip(FetchFailure),
    Abort(FetchFailure),
}

/// Issues the per-commodity requests for one period and direction, strictly
/// one after another.
pub struct Fetcher<T> {
    transport: T,
    base_url: Url,
    api_key: Option<String>,
    policy: FailurePolicy,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, base_url: Url, api_key: Option<String>, policy: FailurePolicy) -> Self {
        Self {
            transport,
            base_url,
            api_key,
            policy,
        }
    }

    /// Fetch every code in `codes` for `period`, in order, with the fields and
    /// direction of `schema`. Failed queries are skipped unless the policy aborts.
    pub async fn fetch(
        &self,
        period: Period,
        codes: &[CommodityCode],
        schema: &FieldSchema,
    ) -> Result<FetchOutcome, FetchAborted> {
        let mut out = FetchOutcome::default();

        for code in codes {
            let key = QueryKey {
                period,
                code: code.clone(),
                direction: schema.direction(),
            };
            match self.fetch_one(&key, schema).await {
                Ok(Some(rows)) => {
                    debug!(%period, %code, direction = %key.direction, rows = rows.len(), "fetched");
                    out.rows.extend(rows);
                }
                Ok(None) => {
                    info!(%period, %code, direction = %key.direction, "no data");
                    out.empty.push(key);
                }
                Err(Terminal::Skip(reason)) => out.skipped.push(SkippedQuery { key, reason }),
                Err(Terminal::Abort(reason)) => return Err(FetchAborted { key, reason }),
            }
        }

        Ok(out)
    }

    async fn fetch_one(
        &self,
        key: &QueryKey,
        schema: &FieldSchema,
    ) -> Result<Option<Vec<RawRecord>>, Terminal> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.attempt(key, schema).await {
                Ok(rows) => return Ok(rows),
                Err(f) => f,
            };
            let decision = self.policy.decide(&failure, attempt);
            log_decision(key, &failure, attempt, &decision);
            match decision {
                Decision::Retry { delay } => sleep(delay).await,
                Decision::Skip => return Err(Terminal::Skip(failure)),
                Decision::Abort => return Err(Terminal::Abort(failure)),
            }
        }
    }

    async fn attempt(
        &self,
        key: &QueryKey,
        schema: &FieldSchema,
    ) -> Result<Option<Vec<RawRecord>>, FetchFailure> {
        let url = build_url(&self.base_url, key, schema, self.api_key.as_deref())
            .map_err(|e| FetchFailure::Transport(format!("building request URL: {}", e)))?;
        let reply = self.transport.get(&url).await?;

        // the API answers 204 with an empty body when a month has no data yet
        if reply.status == 204 || (reply.is_success() && reply.body.trim().is_empty()) {
            return Ok(None);
        }
        if !reply.is_success() {
            return Err(FetchFailure::Status {
                status: reply.status,
            });
        }
        parse_response(&reply.body, schema.response_arity()).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldList, TradeDirection};
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    /// Replies keyed on the commodity predicate; each code has a queue of replies,
    /// the last one repeating.
    struct Scripted {
        replies: Mutex<HashMap<String, Vec<Result<Reply, FetchFailure>>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(entries: Vec<(&str, Vec<Result<Reply, FetchFailure>>)>) -> Self {
            Self {
                replies: Mutex::new(
                    entries
                        .into_iter()
                        .map(|(code, r)| (code.to_string(), r))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn get(&self, url: &Url) -> Result<Reply, FetchFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let code = url
                .query_pairs()
                .find(|(k, _)| k.ends_with("_COMMODITY"))
                .map(|(_, v)| v.into_owned())
                .unwrap();
            let mut replies = self.replies.lock().unwrap();
            let queue = replies.get_mut(&code).unwrap();
            if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue[0].clone()
            }
        }
    }

    fn ok(code: &str, countries: &[&str]) -> Result<Reply, FetchFailure> {
        let mut rows = vec![r#"["I_COMMODITY","CTY_CODE","time","I_COMMODITY","SUMMARY_LVL"]"#.to_string()];
        for c in countries {
            rows.push(format!(r#"["{code}","{c}","2024-10","{code}","DET"]"#));
        }
        Ok(Reply {
            status: 200,
            body: format!("[{}]", rows.join(",")),
        })
    }

    fn status(status: u16) -> Result<Reply, FetchFailure> {
        Ok(Reply {
            status,
            body: String::new(),
        })
    }

    fn schema() -> FieldSchema {
        FieldSchema::new(
            TradeDirection::ImportsGeneral,
            FieldList::Csv("I_COMMODITY,CTY_CODE".into()).into_names(),
        )
        .unwrap()
    }

    fn codes(codes: &[&str]) -> Vec<CommodityCode> {
        codes.iter().map(|c| c.parse().unwrap()).collect()
    }

    fn fetcher(transport: Scripted, policy: FailurePolicy) -> Fetcher<Scripted> {
        Fetcher::new(
            transport,
            Url::parse("https://api.example.test/intltrade/").unwrap(),
            None,
            policy,
        )
    }

    #[tokio::test]
    async fn failed_code_is_skipped_and_others_kept_in_order() {
        let transport = Scripted::new(vec![
            ("1111111111", vec![ok("1111111111", &["1220", "5700"])]),
            ("2222222222", vec![status(500)]),
            ("3333333333", vec![ok("3333333333", &["4280"])]),
        ]);
        let f = fetcher(transport, FailurePolicy::default());
        let out = f
            .fetch(
                "2024-10".parse().unwrap(),
                &codes(&["1111111111", "2222222222", "3333333333"]),
                &schema(),
            )
            .await
            .unwrap();

        let firsts: Vec<(&str, &str)> = out
            .rows
            .iter()
            .map(|r| (r[0].as_str(), r[1].as_str()))
            .collect();
        assert_eq!(
            firsts,
            [("1111111111", "1220"), ("1111111111", "5700"), ("3333333333", "4280")]
        );
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].key.code.as_str(), "2222222222");
        assert_eq!(out.skipped[0].reason, FetchFailure::Status { status: 500 });
    }

    #[tokio::test]
    async fn malformed_json_is_skipped() {
        let transport = Scripted::new(vec![(
            "1111111111",
            vec![Ok(Reply {
                status: 200,
                body: "error: unknown variable".into(),
            })],
        )]);
        let f = fetcher(transport, FailurePolicy::default());
        let out = f
            .fetch("2024-10".parse().unwrap(), &codes(&["1111111111"]), &schema())
            .await
            .unwrap();
        assert!(out.rows.is_empty());
        assert!(matches!(out.skipped[0].reason, FetchFailure::Decode(_)));
    }

    #[tokio::test]
    async fn no_content_counts_as_empty_not_skipped() {
        let transport = Scripted::new(vec![("1111111111", vec![status(204)])]);
        let f = fetcher(transport, FailurePolicy::default());
        let out = f
            .fetch("2024-10".parse().unwrap(), &codes(&["1111111111"]), &schema())
            .await
            .unwrap();
        assert!(out.rows.is_empty());
        assert!(out.skipped.is_empty());
        assert_eq!(out.empty.len(), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let transport = Scripted::new(vec![(
            "1111111111",
            vec![
                Err(FetchFailure::Transport("reset".into())),
                status(503),
                ok("1111111111", &["1220"]),
            ],
        )]);
        let policy = FailurePolicy {
            retries: 2,
            backoff_ms: 0,
            ..FailurePolicy::default()
        };
        let f = fetcher(transport, policy);
        let out = f
            .fetch("2024-10".parse().unwrap(), &codes(&["1111111111"]), &schema())
            .await
            .unwrap();
        assert_eq!(out.rows.len(), 1);
        assert!(out.skipped.is_empty());
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn abort_policy_stops_at_first_failure() {
        let transport = Scripted::new(vec![
            ("1111111111", vec![status(404)]),
            ("2222222222", vec![ok("2222222222", &["1220"])]),
        ]);
        let policy = FailurePolicy {
            on_failure: OnFailure::Abort,
            ..FailurePolicy::default()
        };
        let f = fetcher(transport, policy);
        let err = f
            .fetch(
                "2024-10".parse().unwrap(),
                &codes(&["1111111111", "2222222222"]),
                &schema(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.key.code.as_str(), "1111111111");
        assert_eq!(f.transport.calls.load(Ordering::SeqCst), 1);
    }
}
