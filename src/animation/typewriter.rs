//! Hero heading typewriter.
//!
//! [`Typewriter`] computes every frame of the effect up front from the
//! heading text; [`start`] plays those frames into the heading on a timer.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashSet;
use web_time::Duration;

use crate::dom::Subscriptions;
use crate::host::Host;
use crate::options::TypewriterOptions;

/// Heading the effect types into.
pub const HEADING_SELECTOR: &str = ".hero-heading";
/// Blinking caret appended to every intermediate frame.
pub const CURSOR_HTML: &str = "<span class=\"typewriter-cursor\">|</span>";

/// Frame generator for one heading.
#[derive(Debug, Clone)]
pub struct Typewriter {
    words: Vec<String>,
    highlights: FxHashSet<String>,
    break_after: String,
    plain: Vec<char>,
}

impl Typewriter {
    /// Generator for the configured text.
    #[must_use]
    pub fn new(options: &TypewriterOptions) -> Self {
        let words: Vec<String> = options.text.split(' ').map(str::to_owned).collect();
        let plain = words.join(" ").chars().collect();
        Self {
            words,
            highlights: options.highlights.iter().cloned().collect(),
            break_after: options.break_after.clone(),
            plain,
        }
    }

    /// Characters to type.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plain.len()
    }

    /// Whether there is nothing to type.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plain.is_empty()
    }

    fn push_word(&self, html: &mut String, word: &str) {
        if word == self.break_after {
            html.push_str(word);
            html.push_str("<br />");
        } else if self.highlights.contains(word) {
            html.push_str("<span class=\"highlight\">");
            html.push_str(word);
            html.push_str("</span>");
        } else {
            html.push_str(word);
        }
    }

    /// Fully typed heading: highlights wrapped, line break inserted, no
    /// caret.
    #[must_use]
    pub fn final_html(&self) -> String {
        let mut html = String::new();
        for (i, word) in self.words.iter().enumerate() {
            if i > 0 {
                html.push(' ');
            }
            self.push_word(&mut html, word);
        }
        html
    }

    /// Heading with the first `visible` characters typed, followed by the
    /// caret. Only fully typed words get their formatting.
    #[must_use]
    pub fn frame(&self, visible: usize) -> String {
        let visible = &self.plain[..visible.min(self.plain.len())];
        let mut html = String::new();
        let mut at = 0;
        for (i, word) in self.words.iter().enumerate() {
            if i > 0 {
                if visible.get(at) == Some(&' ') {
                    html.push(' ');
                    at += 1;
                } else {
                    break;
                }
            }
            let end = at + word.chars().count();
            if end <= visible.len() {
                self.push_word(&mut html, word);
                at = end;
            } else {
                html.extend(&visible[at..]);
                break;
            }
        }
        html.push_str(CURSOR_HTML);
        html
    }

    /// Every heading state in order: one frame per typed character, then
    /// the final markup.
    pub fn frames(&self) -> impl Iterator<Item = String> + '_ {
        (1..=self.len())
            .map(|n| self.frame(n))
            .chain(std::iter::once(self.final_html()))
    }
}

/// Progress of a running typewriter.
#[derive(Debug, Default)]
pub struct TypewriterProgress {
    typed: Cell<usize>,
    done: Cell<bool>,
}

impl TypewriterProgress {
    /// Characters shown so far.
    pub fn typed(&self) -> usize {
        self.typed.get()
    }

    /// Whether the final markup is in place.
    pub fn is_done(&self) -> bool {
        self.done.get()
    }
}

/// Blank the heading and type `writer` into it: the first character after
/// `start_delay`, then one every `char_delay`.
pub fn start<H: Host>(
    subs: &Rc<Subscriptions<H>>,
    heading: H::Node,
    writer: Typewriter,
    start_delay: Duration,
    char_delay: Duration,
) -> Rc<TypewriterProgress> {
    let host = subs.host();
    host.set_inner_html(&heading, "");
    host.set_style(&heading, "opacity", "1");
    let progress = Rc::new(TypewriterProgress::default());
    let run = Rc::new(Run {
        subs: Rc::downgrade(subs),
        heading,
        writer,
        char_delay,
        progress: Rc::clone(&progress),
    });
    run.schedule(start_delay);
    progress
}

struct Run<H: Host> {
    subs: Weak<Subscriptions<H>>,
    heading: H::Node,
    writer: Typewriter,
    char_delay: Duration,
    progress: Rc<TypewriterProgress>,
}

impl<H: Host> Run<H> {
    fn schedule(self: Rc<Self>, delay: Duration) {
        let Some(subs) = self.subs.upgrade() else { return };
        let _ = subs.timeout(delay, move || self.step());
    }

    fn step(self: Rc<Self>) {
        let Some(subs) = self.subs.upgrade() else { return };
        let host = subs.host();
        let typed = self.progress.typed.get();
        if typed < self.writer.len() {
            host.set_inner_html(&self.heading, &self.writer.frame(typed + 1));
            self.progress.typed.set(typed + 1);
            let delay = self.char_delay;
            self.schedule(delay);
        } else {
            host.set_inner_html(&self.heading, &self.writer.final_html());
            self.progress.done.set(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn writer(text: &str) -> Typewriter {
        Typewriter::new(&TypewriterOptions {
            text: text.into(),
            ..TypewriterOptions::default()
        })
    }

    #[test]
    fn final_markup_formats_highlights_and_break() {
        let w = Typewriter::new(&TypewriterOptions::default());
        assert_eq!(
            w.final_html(),
            "Transforming <span class=\"highlight\">Visions</span> into<br /> \
             <span class=\"highlight\">Intuitive</span> \
             <span class=\"highlight\">Digital</span> \
             <span class=\"highlight\">Realities</span>"
        );
        assert_eq!(w.len(), "Transforming Visions into Intuitive Digital Realities".len());
    }

    #[test]
    fn partial_words_stay_plain() {
        let w = writer("Transforming Visions into Intuitive");
        assert_eq!(w.frame(1), format!("T{CURSOR_HTML}"));
        assert_eq!(w.frame(16), format!("Transforming Vis{CURSOR_HTML}"));
        assert_eq!(
            w.frame(20),
            format!("Transforming <span class=\"highlight\">Visions</span>{CURSOR_HTML}")
        );
        assert_eq!(
            w.frame(26),
            format!(
                "Transforming <span class=\"highlight\">Visions</span> into<br /> {CURSOR_HTML}"
            )
        );
    }

    #[test]
    fn last_frame_is_final_markup_without_caret() {
        let w = Typewriter::new(&TypewriterOptions::default());
        let frames: Vec<String> = w.frames().collect();
        assert_eq!(frames.len(), w.len() + 1);
        assert!(frames[..w.len()].iter().all(|f| f.ends_with(CURSOR_HTML)));
        let last = frames.last().unwrap();
        assert_eq!(*last, w.final_html());
        assert!(!last.contains("typewriter-cursor"));
    }

    #[test]
    fn plays_on_the_clock() {
        let host = Rc::new(MemoryHost::from_html("<h1 class=\"hero-heading\">Hi</h1>"));
        let subs = Rc::new(Subscriptions::new(Rc::clone(&host)));
        let heading = host.select(HEADING_SELECTOR).unwrap();
        let progress = start(
            &subs,
            heading,
            writer("Hello Digital"),
            Duration::from_millis(800),
            Duration::from_millis(80),
        );
        assert_eq!(host.inner_html(heading), "");
        assert_eq!(host.style(heading, "opacity").as_deref(), Some("1"));

        host.advance(Duration::from_millis(800));
        assert_eq!(progress.typed(), 1);
        assert_eq!(host.text_content(heading), "H|");

        host.advance(Duration::from_millis(80 * 13));
        assert!(progress.is_done());
        assert_eq!(
            host.inner_html(heading),
            "Hello <span class=\"highlight\">Digital</span>"
        );
        assert_eq!(host.pending_timers(), 0);
    }
}
