use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

static VOICE_DIR: Dir = include_dir!("src/voices");

#[derive(Error, Debug)]
pub enum LexiconError {
    #[error("unknown voice `{0}`")]
    UnknownVoice(String),
    #[error("voice file for `{0}` is not valid UTF-8")]
    NotUtf8(String),
    #[error("failed to parse voice data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("lexicon has no word groups")]
    NoGroups,
    #[error("word group {0} is empty")]
    EmptyGroup(usize),
    #[error("duplicate word `{word}` in group {group}")]
    DuplicateWord { group: usize, word: String },
    #[error("no selectable word groups declared")]
    NoSelectableGroups,
    #[error("selectable group index {0} out of range")]
    SelectableOutOfRange(usize),
    #[error("word group index {0} out of range")]
    GroupOutOfRange(usize),
    #[error("word index {word} out of range for group {group}")]
    WordOutOfRange { group: usize, word: usize },
    #[error("group {group} holds {have} words, cannot offer {want} distinct options")]
    NotEnoughWords {
        group: usize,
        want: usize,
        have: usize,
    },
}

/// One talker word: its text, the clip spoken by the current voice, and the
/// icon shown on its selection button.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct WordEntry {
    pub word: String,
    pub clip: String,
    pub icon: String,
}

/// An ordered slot of the sentence frame (name, verb, number, ...).
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct WordGroup {
    pub label: String,
    pub entries: Vec<WordEntry>,
}

/// Left/right distractor story clips for a voice.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct DistracterTracks {
    pub left: String,
    pub right: String,
}

/// A single answer option handed to the selection UI.
#[derive(Clone, Debug, PartialEq)]
pub struct WordOption {
    pub word: String,
    pub icon: String,
}

/// Voice-specific word database, embedded in the binary as JSON.
#[derive(Deserialize, Clone, Debug)]
pub struct Lexicon {
    pub name: String,
    pub groups: Vec<WordGroup>,
    pub selectable: Vec<usize>,
    pub distracters: DistracterTracks,
}

impl Lexicon {
    pub fn load(voice: &str) -> Result<Self, LexiconError> {
        let file = VOICE_DIR
            .get_file(format!("{voice}.json"))
            .ok_or_else(|| LexiconError::UnknownVoice(voice.to_string()))?;
        let text = file
            .contents_utf8()
            .ok_or_else(|| LexiconError::NotUtf8(voice.to_string()))?;
        let lexicon: Lexicon = serde_json::from_str(text)?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    /// Structural checks applied to every lexicon before use.
    pub fn validate(&self) -> Result<(), LexiconError> {
        if self.groups.is_empty() {
            return Err(LexiconError::NoGroups);
        }
        for (g, group) in self.groups.iter().enumerate() {
            if group.entries.is_empty() {
                return Err(LexiconError::EmptyGroup(g));
            }
            for (i, entry) in group.entries.iter().enumerate() {
                if group.entries[..i].iter().any(|e| e.word == entry.word) {
                    return Err(LexiconError::DuplicateWord {
                        group: g,
                        word: entry.word.clone(),
                    });
                }
            }
        }
        if self.selectable.is_empty() {
            return Err(LexiconError::NoSelectableGroups);
        }
        for &g in &self.selectable {
            if g >= self.groups.len() {
                return Err(LexiconError::SelectableOutOfRange(g));
            }
        }
        Ok(())
    }

    /// Number of word groups; each sentence has one slot per group.
    pub fn sentence_len(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, ix: usize) -> Result<&WordGroup, LexiconError> {
        self.groups.get(ix).ok_or(LexiconError::GroupOutOfRange(ix))
    }

    /// Group indices eligible for the word-selection challenge.
    pub fn selectable(&self) -> &[usize] {
        &self.selectable
    }

    /// Builds the option set for one round: `count` distinct words from the
    /// given group with the correct word always at position 0. Distractors
    /// are drawn without replacement so the call terminates and stays
    /// uniform even when `count` equals the group size.
    pub fn selectable_words(
        &self,
        group_ix: usize,
        count: usize,
        correct_ix: usize,
        rng: &mut impl Rng,
    ) -> Result<Vec<WordOption>, LexiconError> {
        let group = self.group(group_ix)?;
        let correct = group
            .entries
            .get(correct_ix)
            .ok_or(LexiconError::WordOutOfRange {
                group: group_ix,
                word: correct_ix,
            })?;
        if count > group.entries.len() {
            return Err(LexiconError::NotEnoughWords {
                group: group_ix,
                want: count,
                have: group.entries.len(),
            });
        }

        let mut options = Vec::with_capacity(count);
        options.push(WordOption {
            word: correct.word.clone(),
            icon: correct.icon.clone(),
        });

        let pool: Vec<&WordEntry> = group
            .entries
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != correct_ix)
            .map(|(_, e)| e)
            .collect();
        for entry in pool.choose_multiple(rng, count - 1) {
            options.push(WordOption {
                word: entry.word.clone(),
                icon: entry.icon.clone(),
            });
        }

        Ok(options)
    }
}
