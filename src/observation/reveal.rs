//! One-shot entrance reveals for sections and content cards.

use std::rc::{Rc, Weak};

use web_time::Duration;

use crate::dom::{set_styles, Subscriptions};
use crate::host::{Host, Intersection, WatchCallback, WatcherId};

/// Sections revealed on scroll.
pub const SECTION_SELECTOR: &str = "main section";
/// Class that triggers the CSS entrance transition.
pub const REVEAL_CLASS: &str = "animate-in";
/// Cards revealed individually.
pub const CARD_SELECTOR: &str = ".project-grid-cell, .expertise-grid-cell";
/// About block revealed as two halves.
pub const ABOUT_SELECTOR: &str = ".about-me .content";

const EXPERTISE_CARD: &str = "expertise-grid-cell";
const PROJECT_CARD: &str = "project-grid-cell";

const CARD_DELAY: Duration = Duration::from_millis(100);
const ICON_STAGGER_MS: u64 = 100;
const ABOUT_TEXT_DELAY: Duration = Duration::from_millis(200);
const ABOUT_IMAGE_DELAY: Duration = Duration::from_millis(400);

/// Watcher callback that marks intersecting sections with
/// [`REVEAL_CLASS`] and stops watching them.
pub fn section_callback<H: Host>(host: &Rc<H>) -> WatchCallback<H::Node> {
    let host = Rc::downgrade(host);
    Rc::new(move |watcher: WatcherId, entries: &[Intersection<H::Node>]| {
        let Some(host) = host.upgrade() else { return };
        for entry in entries.iter().filter(|e| e.is_intersecting) {
            host.add_class(&entry.target, REVEAL_CLASS);
            host.unobserve(watcher, &entry.target);
        }
    })
}

/// Watcher callback that runs the per-kind content reveal once per element.
pub fn content_callback<H: Host>(
    subs: &Rc<Subscriptions<H>>,
) -> WatchCallback<H::Node> {
    let subs: Weak<Subscriptions<H>> = Rc::downgrade(subs);
    Rc::new(move |watcher: WatcherId, entries: &[Intersection<H::Node>]| {
        let Some(subs) = subs.upgrade() else { return };
        for entry in entries.iter().filter(|e| e.is_intersecting) {
            subs.host().unobserve(watcher, &entry.target);
            reveal_content(&subs, &entry.target);
        }
    })
}

/// Apply the entrance effect matching the element's kind.
pub fn reveal_content<H: Host>(subs: &Subscriptions<H>, element: &H::Node) {
    let host = subs.host();
    if host.has_class(element, EXPERTISE_CARD) {
        let card = element.clone();
        let host = Rc::clone(host);
        let icons = host.select_within(&card, ".icons img");
        let _ = subs.timeout(CARD_DELAY, move || {
            set_styles(&*host, &card, &[("opacity", "1"), ("transform", "translateY(0)")]);
        });
        for (i, icon) in icons.into_iter().enumerate() {
            let host = Rc::clone(subs.host());
            let delay = CARD_DELAY + Duration::from_millis(i as u64 * ICON_STAGGER_MS);
            let _ = subs.timeout(delay, move || {
                host.set_style(&icon, "transform", "scale(1) rotate(360deg)");
            });
        }
    } else if host.has_class(element, PROJECT_CARD) {
        let card = element.clone();
        let host = Rc::clone(host);
        let _ = subs.timeout(CARD_DELAY, move || {
            set_styles(
                &*host,
                &card,
                &[("opacity", "1"), ("transform", "translateY(0) scale(1)")],
            );
        });
    } else if host.closest(element, ".about-me").is_some() {
        reveal_about(subs, element);
    } else {
        host.add_class(element, REVEAL_CLASS);
    }
}

fn reveal_about<H: Host>(subs: &Subscriptions<H>, block: &H::Node) {
    let host = subs.host();
    let halves = [
        (".sub-content", "translateX(-50px)", ABOUT_TEXT_DELAY),
        (".image", "translateX(50px)", ABOUT_IMAGE_DELAY),
    ];
    for (selector, offset, delay) in halves {
        let Some(part) = host.select_within(block, selector).into_iter().next()
        else {
            continue;
        };
        set_styles(&**host, &part, &[("opacity", "0"), ("transform", offset)]);
        let host = Rc::clone(host);
        let _ = subs.timeout(delay, move || {
            set_styles(
                &*host,
                &part,
                &[
                    ("transition", "all 0.8s ease"),
                    ("opacity", "1"),
                    ("transform", "translateX(0)"),
                ],
            );
        });
    }
}

/// Give every card the uniform transition delay.
pub fn prepare_cards<H: Host>(host: &H) -> Vec<H::Node> {
    let cards = host.select_all(CARD_SELECTOR);
    for card in &cards {
        host.set_style(card, "transition-delay", "0.1s");
    }
    cards
}

/// Show everything immediately when viewport watchers are unavailable.
pub fn reveal_all_now<H: Host>(host: &H) {
    for section in host.select_all(SECTION_SELECTOR) {
        host.add_class(&section, REVEAL_CLASS);
    }
    for card in host.select_all(CARD_SELECTOR) {
        set_styles(
            host,
            &card,
            &[("opacity", "1"), ("transform", "translateY(0) scale(1)")],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryHost, WatchOptions};

    #[test]
    fn sections_are_revealed_once_and_unwatched() {
        let host = Rc::new(MemoryHost::from_html(
            "<main><section id=\"a\"></section><section id=\"b\"></section></main>",
        ));
        let watcher = host
            .watch(&WatchOptions::default(), section_callback(&host))
            .unwrap();
        let sections = host.select_all(SECTION_SELECTOR);
        for s in &sections {
            host.observe(watcher, s);
        }

        host.set_intersecting(sections[0], false);
        assert!(!host.has_class(&sections[0], REVEAL_CLASS));
        host.set_intersecting(sections[0], true);
        assert!(host.has_class(&sections[0], REVEAL_CLASS));
        assert_eq!(host.observed_count(watcher), 1);

        // Leaving the viewport never removes the mark.
        host.set_intersecting(sections[0], false);
        assert!(host.has_class(&sections[0], REVEAL_CLASS));
    }

    #[test]
    fn expertise_card_and_icons_reveal_in_sequence() {
        let host = Rc::new(MemoryHost::from_html(
            "<div class=\"expertise-grid-cell\"><div class=\"icons\">\
             <img src=\"a.svg\"><img src=\"b.svg\"></div></div>",
        ));
        let subs = Subscriptions::new(Rc::clone(&host));
        let card = host.select(".expertise-grid-cell").unwrap();
        let icons = host.select_all(".icons img");

        reveal_content(&subs, &card);
        host.advance(Duration::from_millis(100));
        assert_eq!(host.style(card, "opacity").as_deref(), Some("1"));
        assert_eq!(
            host.style(icons[0], "transform").as_deref(),
            Some("scale(1) rotate(360deg)")
        );
        assert_eq!(host.style(icons[1], "transform"), None);
        host.advance(Duration::from_millis(100));
        assert!(host.style(icons[1], "transform").is_some());
    }

    #[test]
    fn about_halves_slide_in_from_opposite_sides() {
        let host = Rc::new(MemoryHost::from_html(
            "<div class=\"about-me\"><div class=\"content\">\
             <div class=\"sub-content\"></div><div class=\"image\"></div></div></div>",
        ));
        let subs = Subscriptions::new(Rc::clone(&host));
        let block = host.select(ABOUT_SELECTOR).unwrap();
        let text = host.select(".sub-content").unwrap();
        let image = host.select(".image").unwrap();

        reveal_content(&subs, &block);
        assert_eq!(host.style(image, "transform").as_deref(), Some("translateX(50px)"));
        host.advance(Duration::from_millis(200));
        assert_eq!(host.style(text, "opacity").as_deref(), Some("1"));
        assert_eq!(host.style(image, "opacity").as_deref(), Some("0"));
        host.advance(Duration::from_millis(200));
        assert_eq!(host.style(image, "transform").as_deref(), Some("translateX(0)"));
    }

    #[test]
    fn fallback_reveals_everything() {
        let host = MemoryHost::from_html(
            "<main><section></section></main><div class=\"project-grid-cell\"></div>",
        );
        reveal_all_now(&host);
        let section = host.select("main section").unwrap();
        let card = host.select(".project-grid-cell").unwrap();
        assert!(host.has_class(&section, REVEAL_CLASS));
        assert_eq!(
            host.style(card, "transform").as_deref(),
            Some("translateY(0) scale(1)")
        );
    }
}
