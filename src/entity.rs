//! Company-based grouping (the Entity Grouper).
//!
//! Articles are sent to the oracle in fixed-size batches; each batch comes
//! back with a best-guess organization and an English headline per article.
//! Every article sharing a normalized organization name is then merged into
//! one cluster, across batch boundaries. Articles without an organization
//! (the "None" sentinel, a malformed item, or a failed batch) stay singletons.
//!
//! Batches are independent, so up to `concurrency` of them may be in flight;
//! the merge runs afterwards on the ordered results and does not depend on
//! completion order.

use crate::models::{Article, Cluster};
use crate::oracle::{EntityAssignment, EventOracle};
use crate::settings::EntitySettings;
use crate::utils::capitalize;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Sentinels the oracle uses for "no clear organization".
const NO_ENTITY: &[&str] = &["none", "null", "n/a", "unknown", "無", "なし"];

/// Trim and capitalize an organization name; `None` for sentinel values.
pub fn normalize_company(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c: char| c == '"' || c == '\'').trim();
    if trimmed.is_empty() || NO_ENTITY.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }
    Some(capitalize(trimmed))
}

/// Groups articles by the organization the oracle assigns them.
#[derive(Debug, Clone)]
pub struct EntityGrouper {
    batch_size: usize,
    batch_delay: Duration,
    concurrency: usize,
}

impl EntityGrouper {
    pub fn new(settings: &EntitySettings) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            batch_delay: settings.batch_delay(),
            concurrency: settings.concurrency.max(1),
        }
    }

    /// Partition `articles` into company clusters and singletons.
    ///
    /// Input is ordered by publication time first, so each cluster's
    /// representative is its earliest member. Clusters are returned in order
    /// of their first member.
    #[instrument(level = "info", skip_all, fields(article_count = articles.len(), batch_size = self.batch_size))]
    pub async fn group_by_entity<O: EventOracle>(&self, mut articles: Vec<Article>, oracle: &O) -> Vec<Cluster> {
        let t0 = Instant::now();
        articles.sort_by_key(|a| a.published_at);

        let batches: Vec<(usize, Vec<String>)> = articles
            .chunks(self.batch_size)
            .enumerate()
            .map(|(i, chunk)| (i, chunk.iter().map(|a| a.raw_title.clone()).collect()))
            .collect();
        let batch_count = batches.len();

        let delay = self.batch_delay;
        // The delay sits upstream of `buffered`, so dispatches are spaced by
        // `delay` even while earlier batches are still in flight.
        let results: Vec<(usize, Vec<EntityAssignment>)> = stream::iter(batches)
            .then(|(i, titles)| async move {
                if i > 0 && !delay.is_zero() {
                    sleep(delay).await;
                }
                (i, titles)
            })
            .map(|(i, titles)| async move {
                debug!(batch = i, batch_len = titles.len(), "Dispatching entity batch");
                let assignments = oracle.assign_entities(&titles).await;
                if assignments.is_empty() {
                    warn!(batch = i, batch_len = titles.len(), "Entity batch returned nothing; articles stay singletons");
                }
                (i, assignments)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut tagged = 0usize;
        for (batch, assignments) in results {
            let offset = batch * self.batch_size;
            let batch_len = self.batch_size.min(articles.len().saturating_sub(offset));
            for a in assignments {
                if a.id >= batch_len {
                    warn!(batch, id = a.id, "Assignment id outside its batch; ignored");
                    continue;
                }
                let article = &mut articles[offset + a.id];
                if let Some(title) = a.title.filter(|t| *t != article.raw_title) {
                    article.translated_title = Some(title);
                }
                article.company = normalize_company(&a.company);
                if article.company.is_some() {
                    tagged += 1;
                }
            }
        }

        let clusters = merge_by_company(articles);
        info!(
            batches = batch_count,
            tagged,
            clusters = clusters.len(),
            elapsed_ms = t0.elapsed().as_millis() as u128,
            "Entity grouping complete"
        );
        clusters
    }
}

/// Union articles by `company`, keeping first-appearance order.
fn merge_by_company(articles: Vec<Article>) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut by_company: HashMap<String, usize> = HashMap::new();

    for article in articles {
        match article.company.clone() {
            Some(company) => match by_company.get(&company) {
                Some(&idx) => clusters[idx].members.push(article),
                None => {
                    by_company.insert(company.clone(), clusters.len());
                    let mut cluster = Cluster::singleton(article);
                    cluster.company = Some(company);
                    clusters.push(cluster);
                }
            },
            None => clusters.push(Cluster::singleton(article)),
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::article;
    use crate::oracle::DisabledOracle;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tags titles from a fixed table; batches listed in `failing` return nothing.
    #[derive(Default)]
    struct TableOracle {
        companies: HashMap<&'static str, &'static str>,
        translations: HashMap<&'static str, &'static str>,
        failing: HashSet<usize>,
        latency: Duration,
        calls: AtomicUsize,
        batch_sizes: Mutex<Vec<usize>>,
        dispatched: Mutex<Vec<tokio::time::Instant>>,
    }

    impl TableOracle {
        fn new(companies: &[(&'static str, &'static str)]) -> Self {
            Self {
                companies: companies.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    impl EventOracle for TableOracle {
        async fn same_event(&self, _a: &str, _b: &str) -> bool {
            false
        }

        async fn assign_entities(&self, titles: &[String]) -> Vec<EntityAssignment> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(titles.len());
            self.dispatched.lock().unwrap().push(tokio::time::Instant::now());
            if !self.latency.is_zero() {
                sleep(self.latency).await;
            }
            if self.failing.contains(&call) {
                return Vec::new();
            }
            titles
                .iter()
                .enumerate()
                .filter_map(|(id, t)| {
                    self.companies.get(t.as_str()).map(|c| EntityAssignment {
                        id,
                        company: c.to_string(),
                        title: self.translations.get(t.as_str()).map(|s| s.to_string()),
                    })
                })
                .collect()
        }
    }

    fn grouper(batch_size: usize, concurrency: usize) -> EntityGrouper {
        EntityGrouper::new(&EntitySettings {
            batch_size,
            batch_delay_ms: 0,
            concurrency,
        })
    }

    #[test]
    fn test_normalize_company() {
        assert_eq!(normalize_company("  apple "), Some("Apple".to_string()));
        assert_eq!(normalize_company("ANTHROPIC"), Some("Anthropic".to_string()));
        assert_eq!(normalize_company("\"Sony\""), Some("Sony".to_string()));
        assert_eq!(normalize_company("台積電"), Some("台積電".to_string()));
        assert_eq!(normalize_company("None"), None);
        assert_eq!(normalize_company("none"), None);
        assert_eq!(normalize_company("N/A"), None);
        assert_eq!(normalize_company("   "), None);
    }

    #[tokio::test]
    async fn test_same_company_merges_across_batches() {
        let oracle = TableOracle::new(&[
            ("Apple unveils chip", "Apple"),
            ("Apple faces EU probe", "apple"),
        ]);
        let clusters = grouper(1, 1)
            .group_by_entity(
                vec![article("Apple unveils chip", 0), article("Apple faces EU probe", 5)],
                &oracle,
            )
            .await;
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].company.as_deref(), Some("Apple"));
        assert_eq!(clusters[0].representative().raw_title, "Apple unveils chip");
        assert_eq!(clusters[0].len(), 2);
    }

    #[tokio::test]
    async fn test_fifteen_articles_one_company_cluster() {
        let anthropic = [
            "Anthropic releases new model",
            "Anthropic signs cloud deal",
            "Anthropic opens Tokyo office",
            "Anthropic raises funding",
            "Anthropic publishes safety report",
        ];
        let mut table: Vec<(&'static str, &'static str)> =
            anthropic.iter().map(|t| (*t, "Anthropic")).collect();
        table[1].1 = "anthropic ";
        table[3].1 = "ANTHROPIC";
        let others: Vec<String> = (0..10).map(|i| format!("Unrelated story {i}")).collect();
        let oracle = TableOracle::new(&table);

        let mut input = Vec::new();
        for (i, t) in anthropic.iter().enumerate() {
            input.push(article(t, (i * 3) as u32));
        }
        for (i, t) in others.iter().enumerate() {
            input.push(article(t, (i * 3 + 1) as u32));
        }

        let clusters = grouper(8, 1).group_by_entity(input, &oracle).await;

        assert_eq!(*oracle.batch_sizes.lock().unwrap(), vec![8, 7]);
        assert_eq!(clusters.len(), 11);
        let company: Vec<&Cluster> = clusters.iter().filter(|c| c.company.is_some()).collect();
        assert_eq!(company.len(), 1);
        assert_eq!(company[0].company.as_deref(), Some("Anthropic"));
        assert_eq!(company[0].len(), 5);
        assert_eq!(clusters.iter().filter(|c| c.len() == 1).count(), 10);
    }

    #[tokio::test]
    async fn test_failed_batch_contributes_singletons() {
        let mut oracle = TableOracle::new(&[
            ("Sony earnings", "Sony"),
            ("Sony layoffs", "Sony"),
            ("Sony new sensor", "Sony"),
            ("Sony stock falls", "Sony"),
        ]);
        oracle.failing.insert(1);
        let input = vec![
            article("Sony earnings", 0),
            article("Sony layoffs", 1),
            article("Sony new sensor", 2),
            article("Sony stock falls", 3),
        ];
        let clusters = grouper(2, 1).group_by_entity(input, &oracle).await;
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].len(), 2);
        assert_eq!(clusters[0].company.as_deref(), Some("Sony"));
        assert!(clusters[1].company.is_none());
        assert!(clusters[2].company.is_none());
    }

    #[tokio::test]
    async fn test_no_entity_sentinel_stays_singleton() {
        let oracle = TableOracle::new(&[("Typhoon hits Taiwan", "None"), ("Quake in Japan", "None")]);
        let clusters = grouper(5, 1)
            .group_by_entity(
                vec![article("Typhoon hits Taiwan", 0), article("Quake in Japan", 1)],
                &oracle,
            )
            .await;
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.company.is_none()));
    }

    #[tokio::test]
    async fn test_translated_titles_are_applied() {
        let mut oracle = TableOracle::new(&[("台積電美國擴產", "TSMC")]);
        oracle.translations.insert("台積電美國擴產", "TSMC expands in the US");
        let clusters = grouper(5, 1)
            .group_by_entity(vec![article("台積電美國擴產", 0)], &oracle)
            .await;
        let rep = clusters[0].representative();
        assert_eq!(rep.translated_title.as_deref(), Some("TSMC expands in the US"));
        assert_eq!(rep.company.as_deref(), Some("Tsmc"));
        assert_eq!(rep.display_title(), "TSMC expands in the US");
    }

    #[tokio::test]
    async fn test_parallel_batches_give_same_grouping() {
        let table = [
            ("Intel cuts jobs", "Intel"),
            ("AMD ships MI400", "AMD"),
            ("Intel foundry update", "Intel"),
            ("AMD beats estimates", "AMD"),
            ("Intel CEO interview", "Intel"),
        ];
        let input: Vec<Article> = table
            .iter()
            .enumerate()
            .map(|(i, (t, _))| article(t, i as u32))
            .collect();

        let serial = grouper(2, 1)
            .group_by_entity(input.clone(), &TableOracle::new(&table))
            .await;
        let parallel = grouper(2, 3)
            .group_by_entity(input, &TableOracle::new(&table))
            .await;
        assert_eq!(serial, parallel);
        assert_eq!(serial.len(), 2);
        assert_eq!(serial[0].len(), 3);
    }

    async fn dispatch_offsets(concurrency: usize) -> Vec<u64> {
        let grouper = EntityGrouper::new(&EntitySettings {
            batch_size: 1,
            batch_delay_ms: 1000,
            concurrency,
        });
        let oracle = TableOracle {
            latency: Duration::from_secs(5),
            ..TableOracle::default()
        };
        let input = vec![article("a", 0), article("b", 1), article("c", 2)];

        let start = tokio::time::Instant::now();
        grouper.group_by_entity(input, &oracle).await;
        oracle
            .dispatched
            .lock()
            .unwrap()
            .iter()
            .map(|t| (*t - start).as_millis() as u64)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_dispatches_are_spaced_by_delay() {
        assert_eq!(dispatch_offsets(3).await, vec![0, 1000, 2000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_dispatch_waits_for_previous_batch_and_delay() {
        assert_eq!(dispatch_offsets(1).await, vec![0, 6000, 12000]);
    }

    #[tokio::test]
    async fn test_without_oracle_everything_is_singleton() {
        let clusters = grouper(3, 1)
            .group_by_entity(
                vec![article("Apple unveils chip", 0), article("Apple faces EU probe", 1)],
                &DisabledOracle,
            )
            .await;
        assert_eq!(clusters.len(), 2);
    }
}
