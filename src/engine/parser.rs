//! Parser for `info` progress lines and the ranked result set they build.
//!
//! Engines interleave progress updates for several ranked lines (multi-PV)
//! while they deepen a search. Each `info` line carries some subset of the
//! fields of one ranked line; [`ResultSet::merge`] folds those partial
//! updates into a dense, rank-ordered list.

use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Highest rank accepted from an engine. Stockfish caps `MultiPV` at 500.
pub const MAX_RANK: u32 = 500;

/// How the search loop treats one line of engine output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// An `info` line carrying a principal variation.
    Progress,
    /// The `bestmove` line that ends a search.
    Terminal,
    /// Anything else: ids, option listings, `info string`, currmove updates.
    Other,
}

impl LineKind {
    /// Classify a line by its tokens.
    ///
    /// A progress line starts with `info` and has a `pv` token before any
    /// `string` token, since everything after `string` is free text.
    #[must_use]
    pub fn classify(line: &str) -> Self {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("bestmove") => Self::Terminal,
            Some("info") => {
                for token in tokens {
                    match token {
                        "pv" => return Self::Progress,
                        "string" => return Self::Other,
                        _ => {}
                    }
                }
                Self::Other
            }
            _ => Self::Other,
        }
    }
}

/// Evaluation of a candidate line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Hundredths of a pawn, from the side to move.
    Centipawns(i32),
    /// Mate in N moves; negative when the side to move is getting mated.
    Mate(i32),
}

/// Why an `info` line could not be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InfoParseError {
    #[error("Not an info line")]
    NotInfo,
    #[error("Missing value for `{0}`")]
    MissingValue(&'static str),
    #[error("Invalid value `{value}` for `{field}`")]
    InvalidValue { field: &'static str, value: String },
}

/// Fields recognized in one `info` line. Absent fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoLine {
    pub multipv: Option<u32>,
    pub depth: Option<u32>,
    pub score: Option<Score>,
    pub pv: Option<Vec<String>>,
}

impl InfoLine {
    /// Parse an `info` line.
    ///
    /// Recognized keywords may appear in any order; unknown keywords and
    /// their values are skipped. Everything after `pv` is the move list,
    /// and scanning stops at `string`.
    ///
    /// # Errors
    ///
    /// Returns `InfoParseError` if the line does not start with `info`, or a
    /// recognized keyword has a missing or unparseable value.
    pub fn parse(line: &str) -> Result<Self, InfoParseError> {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("info") {
            return Err(InfoParseError::NotInfo);
        }

        let mut info = Self::default();
        while let Some(token) = tokens.next() {
            match token {
                "multipv" => {
                    let rank: u32 = parse_value("multipv", tokens.next())?;
                    if rank == 0 || rank > MAX_RANK {
                        return Err(InfoParseError::InvalidValue {
                            field: "multipv",
                            value: rank.to_string(),
                        });
                    }
                    info.multipv = Some(rank);
                }
                "depth" => info.depth = Some(parse_value("depth", tokens.next())?),
                "score" => {
                    if let Some(score) = parse_score(&mut tokens)? {
                        info.score = Some(score);
                    }
                }
                "pv" => {
                    info.pv = Some(tokens.by_ref().map(str::to_string).collect());
                }
                "string" => break,
                _ => {}
            }
        }

        Ok(info)
    }

    /// Rank this update applies to; 1 when `multipv` is absent.
    #[must_use]
    pub fn rank(&self) -> u32 {
        self.multipv.unwrap_or(1)
    }
}

impl FromStr for InfoLine {
    type Err = InfoParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_value<T: FromStr>(field: &'static str, token: Option<&str>) -> Result<T, InfoParseError> {
    let token = token.ok_or(InfoParseError::MissingValue(field))?;
    token.parse().map_err(|_| InfoParseError::InvalidValue {
        field,
        value: token.to_string(),
    })
}

fn parse_score<'a, I>(tokens: &mut I) -> Result<Option<Score>, InfoParseError>
where
    I: Iterator<Item = &'a str>,
{
    match tokens.next() {
        Some("cp") => Ok(Some(Score::Centipawns(parse_value(
            "score cp",
            tokens.next(),
        )?))),
        Some("mate") => Ok(Some(Score::Mate(parse_value("score mate", tokens.next())?))),
        Some(other) => {
            tracing::debug!(kind = other, "Ignoring unknown score kind");
            Ok(None)
        }
        None => Err(InfoParseError::MissingValue("score")),
    }
}

/// One ranked line of a search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLine {
    pub rank: u32,
    pub depth: Option<u32>,
    pub score: Option<Score>,
    pub pv: Vec<String>,
}

impl CandidateLine {
    /// An entry with only its rank set.
    #[must_use]
    pub fn placeholder(rank: u32) -> Self {
        Self {
            rank,
            depth: None,
            score: None,
            pv: Vec::new(),
        }
    }

    #[must_use]
    pub fn score_cp(&self) -> Option<i32> {
        match self.score {
            Some(Score::Centipawns(cp)) => Some(cp),
            _ => None,
        }
    }

    #[must_use]
    pub fn score_mate(&self) -> Option<i32> {
        match self.score {
            Some(Score::Mate(n)) => Some(n),
            _ => None,
        }
    }

    /// First move of the principal variation.
    #[must_use]
    pub fn bestmove(&self) -> Option<&str> {
        self.pv.first().map(String::as_str)
    }

    /// Overwrite the fields present in `update`, keeping the rest.
    pub fn apply(&mut self, update: InfoLine) {
        if let Some(depth) = update.depth {
            self.depth = Some(depth);
        }
        if let Some(score) = update.score {
            self.score = Some(score);
        }
        if let Some(pv) = update.pv {
            self.pv = pv;
        }
    }
}

#[derive(Serialize)]
struct CandidatePayload<'a> {
    rank: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_cp: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_mate: Option<i32>,
    pv: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    bestmove: Option<&'a str>,
}

impl Serialize for CandidateLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CandidatePayload {
            rank: self.rank,
            depth: self.depth,
            score_cp: self.score_cp(),
            score_mate: self.score_mate(),
            pv: &self.pv,
            bestmove: self.bestmove(),
        }
        .serialize(serializer)
    }
}

/// Rank-ordered candidate lines from one search.
///
/// Ranks are always dense: entry `i` has rank `i + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    lines: Vec<CandidateLine>,
}

impl ResultSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a progress update into the entry at its rank.
    ///
    /// Missing lower ranks are filled with placeholders.
    pub fn merge(&mut self, update: InfoLine) {
        let rank = update.rank();
        let Ok(index) = usize::try_from(rank.saturating_sub(1)) else {
            return;
        };
        while self.lines.len() <= index {
            let next_rank = u32::try_from(self.lines.len() + 1).unwrap_or(u32::MAX);
            self.lines.push(CandidateLine::placeholder(next_rank));
        }
        self.lines[index].apply(update);
    }

    #[must_use]
    pub fn lines(&self) -> &[CandidateLine] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The rank 1 line, if any.
    #[must_use]
    pub fn best(&self) -> Option<&CandidateLine> {
        self.lines.first()
    }

    #[must_use]
    pub fn get(&self, rank: u32) -> Option<&CandidateLine> {
        let index = usize::try_from(rank.checked_sub(1)?).ok()?;
        self.lines.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CandidateLine> {
        self.lines.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<CandidateLine> {
        self.lines
    }
}

impl IntoIterator for ResultSet {
    type Item = CandidateLine;
    type IntoIter = std::vec::IntoIter<CandidateLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a CandidateLine;
    type IntoIter = std::slice::Iter<'a, CandidateLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}
