use crate::lexicon::Lexicon;
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentenceError {
    #[error("lexicon has no word groups to build a sentence from")]
    NoGroups,
    #[error("word group {0} is empty")]
    EmptyGroup(usize),
    #[error("slot index {slot} out of range for a {len}-word sentence")]
    SlotOutOfRange { slot: usize, len: usize },
}

/// One generated target sentence: for every word group one uniformly drawn
/// entry, with word text, chosen index, and clip handle aligned by slot.
/// Immutable after generation; the session controller replaces it wholesale
/// at the start of each round.
#[derive(Clone, Debug, PartialEq)]
pub struct Sentence {
    selected: Vec<usize>,
    words: Vec<String>,
    audio: Vec<String>,
}

impl Sentence {
    pub fn generate(lexicon: &Lexicon, rng: &mut impl Rng) -> Result<Self, SentenceError> {
        if lexicon.groups.is_empty() {
            return Err(SentenceError::NoGroups);
        }

        let len = lexicon.sentence_len();
        let mut selected = Vec::with_capacity(len);
        let mut words = Vec::with_capacity(len);
        let mut audio = Vec::with_capacity(len);

        for (g, group) in lexicon.groups.iter().enumerate() {
            if group.entries.is_empty() {
                return Err(SentenceError::EmptyGroup(g));
            }
            let ix = rng.gen_range(0..group.entries.len());
            let entry = &group.entries[ix];
            selected.push(ix);
            words.push(entry.word.clone());
            audio.push(entry.clip.clone());
        }

        Ok(Self {
            selected,
            words,
            audio,
        })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word text spoken at the given slot.
    pub fn word(&self, slot: usize) -> Result<&str, SentenceError> {
        self.words
            .get(slot)
            .map(String::as_str)
            .ok_or(SentenceError::SlotOutOfRange {
                slot,
                len: self.len(),
            })
    }

    /// Index drawn within the slot's word group.
    pub fn word_ix(&self, slot: usize) -> Result<usize, SentenceError> {
        self.selected
            .get(slot)
            .copied()
            .ok_or(SentenceError::SlotOutOfRange {
                slot,
                len: self.len(),
            })
    }

    /// Index of the chosen word within a selectable group. Groups and slots
    /// are aligned one-to-one, so this is a bounds-checked group lookup.
    pub fn selectable_word_ix(&self, group_ix: usize) -> Result<usize, SentenceError> {
        self.word_ix(group_ix)
    }

    /// Clip handles in playback order, one per slot.
    pub fn audio(&self) -> &[String] {
        &self.audio
    }
}
