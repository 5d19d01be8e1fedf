//! Text Locator: one OCR pass per capture, then substring-first /
//! fuzzy-fallback matching of a target label against the recognized phrases.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};

use image::DynamicImage;
use serde::Serialize;
use tracing::debug;

use crate::error::OcrError;
use crate::geometry::BoundingBox;

/// One phrase as reported by the OCR backend, in scan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognizedText {
    pub text: String,
    pub bbox: BoundingBox,
}

impl RecognizedText {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// A recognized phrase scored against a target: 100 for a substring hit,
/// otherwise the fuzzy ratio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub text: String,
    pub bbox: BoundingBox,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// First substring hit in scan order, else the single best fuzzy phrase.
    Best,
    /// Every phrase scored, highest first, scan order breaking ties, truncated to N.
    Ranked(usize),
}

pub trait OcrEngine {
    fn recognize(&mut self, image: &DynamicImage) -> Result<Vec<RecognizedText>, OcrError>;
}

impl<O: OcrEngine + ?Sized> OcrEngine for &mut O {
    fn recognize(&mut self, image: &DynamicImage) -> Result<Vec<RecognizedText>, OcrError> {
        (**self).recognize(image)
    }
}

/// Similarity ratio 0..=100 derived from the normalized edit distance.
pub fn fuzzy_ratio(a: &str, b: &str) -> u8 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    (strsim::normalized_levenshtein(&a, &b) * 100.0).round() as u8
}

/// Score `texts` against `target`. Empty OCR output yields no detections.
pub fn match_text(target: &str, texts: &[RecognizedText], mode: MatchMode) -> Vec<Detection> {
    match mode {
        MatchMode::Best => {
            if let Some(hit) = texts.iter().find(|t| t.text.contains(target)) {
                debug!(target_text = target, found = %hit.text, "exact substring match");
                return vec![Detection {
                    text: hit.text.clone(),
                    bbox: hit.bbox,
                    score: 100,
                }];
            }
            debug!(
                target_text = target,
                phrases = ?texts.iter().map(|t| t.text.as_str()).collect::<Vec<_>>(),
                "no exact match; ranking phrases by similarity"
            );
            let mut best: Option<Detection> = None;
            for text in texts {
                let score = fuzzy_ratio(target, &text.text);
                if best.as_ref().map_or(true, |b| score > b.score) {
                    best = Some(Detection {
                        text: text.text.clone(),
                        bbox: text.bbox,
                        score,
                    });
                }
            }
            if let Some(found) = &best {
                debug!(target_text = target, found = %found.text, score = found.score, "using best fuzzy match");
            }
            best.into_iter().collect()
        }
        MatchMode::Ranked(limit) => {
            let mut ranked: Vec<Detection> = texts
                .iter()
                .map(|t| Detection {
                    text: t.text.clone(),
                    bbox: t.bbox,
                    score: if t.text.contains(target) {
                        100
                    } else {
                        fuzzy_ratio(target, &t.text)
                    },
                })
                .collect();
            // stable: equal scores stay in scan order
            ranked.sort_by(|a, b| b.score.cmp(&a.score));
            ranked.truncate(limit);
            ranked
        }
    }
}

pub struct TextLocator<O> {
    engine: O,
}

impl<O: OcrEngine> TextLocator<O> {
    pub fn new(engine: O) -> Self {
        Self { engine }
    }

    /// One OCR pass over a fresh capture.
    pub fn scan(&mut self, image: &DynamicImage) -> Result<Vec<RecognizedText>, OcrError> {
        let texts = self.engine.recognize(image)?;
        debug!(phrases = texts.len(), "ocr pass complete");
        Ok(texts)
    }

    pub fn locate(
        &mut self,
        target: &str,
        image: &DynamicImage,
        mode: MatchMode,
    ) -> Result<Vec<Detection>, OcrError> {
        let texts = self.scan(image)?;
        Ok(match_text(target, &texts, mode))
    }
}

/// `tesseract` command-line engine reading TSV output.
pub struct TesseractCli {
    program: String,
    language: String,
    scratch_dir: PathBuf,
}

static SCRATCH_COUNTER: AtomicU32 = AtomicU32::new(0);

impl TesseractCli {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
            scratch_dir: env::temp_dir(),
        }
    }

    fn scratch_path(&self) -> PathBuf {
        let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir
            .join(format!("tac-scenario-ocr-{}-{n}.png", std::process::id()))
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&mut self, image: &DynamicImage) -> Result<Vec<RecognizedText>, OcrError> {
        let path = self.scratch_path();
        image.save(&path).map_err(|err| OcrError::Scratch {
            path: path.clone(),
            message: err.to_string(),
        })?;

        let output = Command::new(&self.program)
            .arg(&path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("tsv")
            .stdin(Stdio::null())
            .output();
        let _ = fs::remove_file(&path);
        let output = output.map_err(|source| OcrError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(OcrError::Exit {
                program: self.program.clone(),
                code: output.status.code().unwrap_or(1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(parse_tesseract_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Group word rows into phrases per (block, paragraph, line), unioning their
/// boxes. Phrase order follows the first word of each line.
pub fn parse_tesseract_tsv(raw: &str) -> Vec<RecognizedText> {
    let mut phrases: Vec<((u32, u32, u32, u32), RecognizedText)> = Vec::new();
    for line in raw.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 12 {
            continue;
        }
        // level 5 = word
        if parts[0].trim() != "5" {
            continue;
        }
        let text = parts[11].trim();
        if text.is_empty() {
            continue;
        }
        let conf = match parts[10].trim().parse::<f64>() {
            Ok(v) => v,
            _ => continue,
        };
        if conf < 0.0 {
            continue;
        }
        let mut nums = [0i32; 10];
        let mut ok = true;
        for (slot, raw_num) in nums.iter_mut().zip(&parts[..10]) {
            match raw_num.trim().parse::<i32>() {
                Ok(v) => *slot = v,
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }
        let key = (nums[1] as u32, nums[2] as u32, nums[3] as u32, nums[4] as u32);
        let bbox = BoundingBox::from_rect(nums[6], nums[7], nums[8], nums[9]);

        match phrases.iter_mut().find(|(k, _)| *k == key) {
            Some((_, phrase)) => {
                phrase.text.push(' ');
                phrase.text.push_str(text);
                phrase.bbox = phrase.bbox.union(&bbox);
            }
            None => phrases.push((key, RecognizedText::new(text, bbox))),
        }
    }
    phrases.into_iter().map(|(_, phrase)| phrase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[(&str, i32, i32)]) -> Vec<RecognizedText> {
        items
            .iter()
            .map(|(text, x, y)| RecognizedText::new(*text, BoundingBox::from_rect(*x, *y, 80, 20)))
            .collect()
    }

    #[test]
    fn best_mode_takes_first_substring_hit_in_scan_order() {
        let screen = texts(&[("UNIT", 10, 10), ("UNIT EDITOR", 10, 40), ("UNITS", 10, 70)]);
        let found = match_text("UNIT", &screen, MatchMode::Best);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "UNIT");
        assert_eq!(found[0].score, 100);

        let reordered = texts(&[("UNIT EDITOR", 10, 40), ("UNIT", 10, 10), ("UNITS", 10, 70)]);
        let found = match_text("UNIT", &reordered, MatchMode::Best);
        assert_eq!(found[0].text, "UNIT EDITOR");
    }

    #[test]
    fn best_mode_falls_back_to_fuzzy_ratio() {
        let screen = texts(&[("Infantry", 10, 10), ("Artiliery/Air", 100, 10)]);
        let found = match_text("Artillery/Air", &screen, MatchMode::Best);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "Artiliery/Air");
        assert!(found[0].score < 100);
        assert!(found[0].score > fuzzy_ratio("Artillery/Air", "Infantry"));
    }

    #[test]
    fn empty_ocr_output_yields_nothing() {
        assert!(match_text("OK", &[], MatchMode::Best).is_empty());
        assert!(match_text("OK", &[], MatchMode::Ranked(5)).is_empty());
    }

    #[test]
    fn ranked_mode_sorts_descending_with_scan_order_ties() {
        let screen = texts(&[
            ("Armor", 10, 10),
            ("Rifle Platoon", 50, 100),
            ("Rifle Platoon", 500, 100),
            ("Rifle Platoom", 50, 130),
        ]);
        let ranked = match_text("Rifle Platoon", &screen, MatchMode::Ranked(3));
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].bbox.left(), 50);
        assert_eq!(ranked[1].bbox.left(), 500);
        assert_eq!(ranked[2].text, "Rifle Platoom");
        assert!(ranked[2].score < 100);
    }

    #[test]
    fn fuzzy_ratio_bounds() {
        assert_eq!(fuzzy_ratio("On Map", "on map"), 100);
        assert_eq!(fuzzy_ratio("abc", "xyz"), 0);
    }

    #[test]
    fn tsv_words_group_into_lines() {
        let raw = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
1\t1\t0\t0\t0\t0\t0\t0\t1280\t720\t-1\t\n\
5\t1\t1\t1\t1\t1\t40\t100\t50\t18\t91.2\tRifle\n\
5\t1\t1\t1\t1\t2\t95\t101\t70\t18\t88.0\tPlatoon\n\
5\t1\t2\t1\t1\t1\t400\t60\t80\t20\t95.5\tCHOSEN\n\
5\t1\t2\t1\t2\t1\t400\t90\t10\t20\t-1\t \n";
        let parsed = parse_tesseract_tsv(raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "Rifle Platoon");
        assert_eq!(parsed[0].bbox.left(), 40);
        assert_eq!(parsed[0].bbox.right(), 165);
        assert_eq!(parsed[0].bbox.top(), 100);
        assert_eq!(parsed[0].bbox.bottom(), 119);
        assert_eq!(parsed[1].text, "CHOSEN");
    }

    struct ScriptedOcr(Vec<RecognizedText>);

    impl OcrEngine for ScriptedOcr {
        fn recognize(&mut self, _image: &DynamicImage) -> Result<Vec<RecognizedText>, OcrError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn locator_runs_engine_then_matches() {
        let mut locator = TextLocator::new(ScriptedOcr(texts(&[("Nation", 10, 10), ("German", 10, 40)])));
        let image = DynamicImage::new_rgba8(4, 4);
        let found = locator.locate("German", &image, MatchMode::Best).unwrap();
        assert_eq!(found[0].bbox.top(), 40);
    }
}
