//! Chunk scoring and ranking
//!
//! Five base signals are combined with fixed weights. An optional import
//! graph adds a second-pass boost for files imported by the strongest
//! files, and an optional diversity pass spreads results across files.

pub mod imports;
pub mod query;
pub mod signals;

pub use imports::{FileKey, ImportGraph};
pub use query::{analyze_query, QueryTerms};

use crate::domain::{Chunk, RankedChunk, ScoreBreakdown};
use crate::embed::cosine_similarity;
use std::collections::HashMap;

/// Signal weights. The first five sum to 1.0 and form the base score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub similarity: f64,
    pub path_match: f64,
    pub content_match: f64,
    pub symbol_match: f64,
    pub file_type_boost: f64,
    pub import_boost: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            similarity: 0.45,
            path_match: 0.15,
            content_match: 0.15,
            symbol_match: 0.15,
            file_type_boost: 0.10,
            import_boost: 0.10,
        }
    }
}

impl RankingWeights {
    fn base(&self, b: &ScoreBreakdown) -> f64 {
        self.similarity * b.similarity
            + self.path_match * b.path_match
            + self.content_match * b.content_match
            + self.symbol_match * b.symbol_match
            + self.file_type_boost * b.file_type_boost
    }
}

pub const DEFAULT_IMPORT_TOP_N: usize = 20;
/// Penalty per additional chunk from an already-seen file
pub const DIVERSITY_STEP: f64 = 0.10;
pub const DIVERSITY_CAP: f64 = 0.30;

#[derive(Debug, Clone, Copy)]
pub struct RankOptions<'a> {
    pub import_graph: Option<&'a ImportGraph>,
    pub diversity_penalty: bool,
    pub import_top_n: usize,
    pub weights: RankingWeights,
}

impl Default for RankOptions<'_> {
    fn default() -> Self {
        Self {
            import_graph: None,
            diversity_penalty: false,
            import_top_n: DEFAULT_IMPORT_TOP_N,
            weights: RankingWeights::default(),
        }
    }
}

fn file_key(chunk: &Chunk) -> FileKey {
    (chunk.source_id.clone(), chunk.file_path.clone())
}

/// Score every chunk against the query and return them best first.
///
/// Ordering is a stable sort on descending score, so equal scores keep
/// their input order.
pub fn rank(chunks: Vec<Chunk>, query_embedding: &[f32], query: &str, options: &RankOptions<'_>) -> Vec<RankedChunk> {
    let terms = analyze_query(query);
    let weights = options.weights;

    let mut ranked: Vec<RankedChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let mut identifiers = signals::declared_identifiers(&chunk.content);
            if let Some(name) = &chunk.unit_name {
                identifiers.insert(name.to_lowercase());
                // `Class.method` and `Type::method` also answer to the bare method name
                if let Some(tail) = name.rsplit(['.', ':']).next() {
                    identifiers.insert(tail.to_lowercase());
                }
            }
            let breakdown = ScoreBreakdown {
                similarity: if chunk.embedding.is_empty() {
                    0.0
                } else {
                    cosine_similarity(query_embedding, &chunk.embedding)
                },
                path_match: signals::path_match(&chunk.file_path, &terms.keywords),
                content_match: signals::content_match(&chunk.content, &terms.keywords),
                symbol_match: signals::symbol_match(&identifiers, &terms.symbols),
                file_type_boost: signals::file_type_boost(&chunk.file_path),
                import_boost: 0.0,
            };
            let score = weights.base(&breakdown);
            RankedChunk { chunk, score, breakdown }
        })
        .collect();

    if let Some(graph) = options.import_graph.filter(|g| !g.is_empty()) {
        apply_import_boost(&mut ranked, graph, options.import_top_n, weights.import_boost);
    }

    sort_by_score(&mut ranked);

    if options.diversity_penalty {
        apply_diversity_penalty(&mut ranked);
        sort_by_score(&mut ranked);
    }

    ranked
}

fn sort_by_score(ranked: &mut [RankedChunk]) {
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// The top `top_n` files by base score boost each file they import by their
/// own base score; a file imported by several takes the largest boost.
fn apply_import_boost(ranked: &mut [RankedChunk], graph: &ImportGraph, top_n: usize, weight: f64) {
    let mut file_scores: HashMap<FileKey, f64> = HashMap::new();
    for item in ranked.iter() {
        let entry = file_scores.entry(file_key(&item.chunk)).or_insert(f64::MIN);
        *entry = entry.max(item.score);
    }

    let mut top_files: Vec<(FileKey, f64)> = file_scores.into_iter().collect();
    top_files.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_files.truncate(top_n);

    let mut boosts: HashMap<&FileKey, f64> = HashMap::new();
    for (importer, importer_score) in &top_files {
        for target in graph.imports_of(importer) {
            if target == importer {
                continue;
            }
            let boost = boosts.entry(target).or_insert(0.0);
            *boost = boost.max(importer_score.max(0.0));
        }
    }
    if boosts.is_empty() {
        return;
    }

    for item in ranked.iter_mut() {
        let key = file_key(&item.chunk);
        if let Some(boost) = boosts.get(&key) {
            item.breakdown.import_boost = *boost;
            item.score += weight * boost;
        }
    }
}

/// Walk in rank order; the n-th extra chunk of a file loses
/// `min(n * step, cap)` of its score.
fn apply_diversity_penalty(ranked: &mut [RankedChunk]) {
    let mut seen: HashMap<FileKey, usize> = HashMap::new();
    for item in ranked.iter_mut() {
        let count = seen.entry(file_key(&item.chunk)).or_insert(0);
        if *count > 0 {
            let penalty = (*count as f64 * DIVERSITY_STEP).min(DIVERSITY_CAP);
            item.score *= 1.0 - penalty;
        }
        *count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChunkKind;

    fn chunk(id: &str, path: &str, content: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            source_id: "s".to_string(),
            file_path: path.to_string(),
            content: content.to_string(),
            start_line: 1,
            end_line: 1,
            token_count: 10,
            kind: ChunkKind::Function,
            unit_name: None,
            exported: None,
            embedding,
        }
    }

    fn ids(ranked: &[RankedChunk]) -> Vec<&str> {
        ranked.iter().map(|r| r.chunk.id.as_str()).collect()
    }

    #[test]
    fn higher_similarity_ranks_at_least_as_high() {
        let query = vec![1.0, 0.0];
        // cos = 0.9 and 0.5 respectively
        let high = vec![0.9, (1.0f32 - 0.81).sqrt()];
        let low = vec![0.5, (1.0f32 - 0.25).sqrt()];
        let ranked = rank(
            vec![chunk("low", "src/x.rs", "same body", low), chunk("high", "src/y.rs", "same body", high)],
            &query,
            "unrelated words",
            &RankOptions::default(),
        );
        assert_eq!(ids(&ranked), vec!["high", "low"]);
        assert!((ranked[0].breakdown.similarity - 0.9).abs() < 1e-4);
    }

    #[test]
    fn lexical_signals_favor_matching_symbol() {
        let ranked = rank(
            vec![
                chunk("b", "b.ts", "function helper() {}", Vec::new()),
                chunk("a", "a.ts", "export function login(user) { return user; }", Vec::new()),
            ],
            &[],
            "login",
            &RankOptions::default(),
        );
        assert_eq!(ids(&ranked), vec!["a", "b"]);
        assert_eq!(ranked[0].breakdown.symbol_match, 1.0);
        assert!(ranked[0].breakdown.content_match > 0.0);
        assert_eq!(ranked[1].breakdown.symbol_match, 0.0);
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = rank(
            vec![
                chunk("1", "src/a.rs", "x", Vec::new()),
                chunk("2", "src/b.rs", "x", Vec::new()),
                chunk("3", "src/c.rs", "x", Vec::new()),
            ],
            &[],
            "nothing",
            &RankOptions::default(),
        );
        assert_eq!(ids(&ranked), vec!["1", "2", "3"]);
    }

    #[test]
    fn imported_files_receive_boost_capped_by_importer() {
        let mut graph = ImportGraph::new();
        graph.add_edge(("s".into(), "src/login.ts".into()), ("s".into(), "src/session.ts".into()));
        let options = RankOptions { import_graph: Some(&graph), ..RankOptions::default() };
        let ranked = rank(
            vec![
                chunk("other", "src/other.ts", "const z = 1;", Vec::new()),
                chunk("session", "src/session.ts", "const y = 1;", Vec::new()),
                chunk("login", "src/login.ts", "function login() { login(); }", Vec::new()),
            ],
            &[],
            "login",
            &options,
        );
        assert_eq!(ids(&ranked), vec!["login", "session", "other"]);
        let login = &ranked[0];
        let session = &ranked[1];
        assert_eq!(login.breakdown.import_boost, 0.0);
        assert!(session.breakdown.import_boost > 0.0);
        assert!(session.breakdown.import_boost <= login.score);
    }

    #[test]
    fn diversity_penalty_interleaves_files() {
        let chunks = vec![
            chunk("a1", "src/auth.ts", "login login login", Vec::new()),
            chunk("a2", "src/auth.ts", "login login login", Vec::new()),
            chunk("a3", "src/auth.ts", "login login login", Vec::new()),
            chunk("b1", "src/user.ts", "login login login", Vec::new()),
        ];
        let plain = rank(chunks.clone(), &[], "login", &RankOptions::default());
        assert_eq!(ids(&plain), vec!["a1", "a2", "a3", "b1"]);

        let options = RankOptions { diversity_penalty: true, ..RankOptions::default() };
        let diverse = rank(chunks, &[], "login", &options);
        assert_eq!(ids(&diverse), vec!["a1", "b1", "a2", "a3"]);
        let a3 = diverse.iter().find(|r| r.chunk.id == "a3").unwrap();
        assert!((a3.score - plain[2].score * 0.8).abs() < 1e-9);
    }
}
