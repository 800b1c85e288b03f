//! Deferred image loading for `img[data-src]`.

use std::rc::{Rc, Weak};

use web_time::Duration;

use crate::dom::Subscriptions;
use crate::host::{Host, Intersection, WatchCallback, WatcherId};

/// Images waiting for their real source.
pub const LAZY_SELECTOR: &str = "img[data-src]";
/// Marker class while the real source is pending.
pub const LAZY_CLASS: &str = "lazy";

/// How a lazy image is swapped in.
#[derive(Debug, Clone)]
pub struct LazySwap {
    /// Fade-out before the source swap.
    pub fade: Duration,
    /// Source used when the real one fails.
    pub placeholder: String,
}

/// Watcher callback: the first intersection of each image starts its load
/// and stops watching it, whatever the outcome.
pub fn watch_callback<H: Host>(
    subs: &Rc<Subscriptions<H>>,
    swap: LazySwap,
) -> WatchCallback<H::Node> {
    let subs: Weak<Subscriptions<H>> = Rc::downgrade(subs);
    let swap = Rc::new(swap);
    Rc::new(move |watcher: WatcherId, entries: &[Intersection<H::Node>]| {
        let Some(subs) = subs.upgrade() else { return };
        for entry in entries.iter().filter(|e| e.is_intersecting) {
            subs.host().unobserve(watcher, &entry.target);
            load(&subs, &entry.target, &swap);
        }
    })
}

/// Preload the image's `data-src` through a detached preload image, then swap it in
/// (or substitute the placeholder on failure).
pub fn load<H: Host>(
    subs: &Rc<Subscriptions<H>>,
    img: &H::Node,
    swap: &Rc<LazySwap>,
) {
    let host = subs.host();
    let Some(src) = host.attribute(img, "data-src") else {
        return;
    };
    let weak = Rc::downgrade(subs);
    let img = img.clone();
    let swap = Rc::clone(swap);
    let preload_src = src.clone();
    host.preload_image(
        &preload_src,
        Box::new(move |ok| {
            let Some(subs) = weak.upgrade() else { return };
            let host = Rc::clone(subs.host());
            if ok {
                host.set_style(&img, "opacity", "0");
                let _ = subs.timeout(swap.fade, move || {
                    host.set_attribute(&img, "src", &src);
                    host.remove_attribute(&img, "data-src");
                    host.remove_class(&img, LAZY_CLASS);
                    host.set_style(&img, "opacity", "1");
                });
            } else {
                log::warn!("Failed to load image: {src}");
                host.set_attribute(&img, "src", &swap.placeholder);
                host.remove_attribute(&img, "data-src");
            }
        }),
    );
}

/// Swap the real source in immediately, without preloading or a fade.
pub fn swap_now<H: Host>(host: &H, img: &H::Node) {
    if let Some(src) = host.attribute(img, "data-src") {
        host.set_attribute(img, "src", &src);
        host.remove_attribute(img, "data-src");
        host.remove_class(img, LAZY_CLASS);
    }
}

/// Load every lazy image immediately.
pub fn load_all_now<H: Host>(host: &H) {
    for img in host.select_all(LAZY_SELECTOR) {
        swap_now(host, &img);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryHost, WatchOptions};

    fn setup(markup: &str) -> (Rc<MemoryHost>, Rc<Subscriptions<MemoryHost>>, WatcherId) {
        let host = Rc::new(MemoryHost::from_html(markup));
        let subs = Rc::new(Subscriptions::new(Rc::clone(&host)));
        let swap = LazySwap {
            fade: Duration::from_millis(150),
            placeholder: "/img/placeholder.jpg".into(),
        };
        let watcher = host
            .watch(&WatchOptions::new(0.1, "50px 0px"), watch_callback(&subs, swap))
            .unwrap();
        for img in host.select_all(LAZY_SELECTOR) {
            host.observe(watcher, &img);
        }
        (host, subs, watcher)
    }

    #[test]
    fn swaps_source_after_fade() {
        let (host, _subs, watcher) =
            setup("<img class=\"lazy\" src=\"/tiny.jpg\" data-src=\"/full.jpg\">");
        let img = host.select("img").unwrap();

        host.set_intersecting(img, true);
        assert_eq!(host.observed_count(watcher), 0);
        host.advance(Duration::ZERO);
        assert_eq!(host.style(img, "opacity").as_deref(), Some("0"));
        assert_eq!(host.attribute(&img, "src").as_deref(), Some("/tiny.jpg"));

        host.advance(Duration::from_millis(150));
        assert_eq!(host.attribute(&img, "src").as_deref(), Some("/full.jpg"));
        assert!(host.attribute(&img, "data-src").is_none());
        assert!(!host.has_class(&img, LAZY_CLASS));
        assert_eq!(host.style(img, "opacity").as_deref(), Some("1"));
    }

    #[test]
    fn broken_source_gets_placeholder() {
        let (host, _subs, watcher) = setup("<img data-src=\"/missing.jpg\">");
        host.break_image("/missing.jpg");
        let img = host.select("img").unwrap();

        host.set_intersecting(img, true);
        host.advance(Duration::ZERO);
        assert_eq!(
            host.attribute(&img, "src").as_deref(),
            Some("/img/placeholder.jpg")
        );
        assert!(host.attribute(&img, "data-src").is_none());
        assert_eq!(host.observed_count(watcher), 0);
    }

    #[test]
    fn load_all_now_skips_preloading() {
        let host = MemoryHost::from_html("<img data-src=\"/a.jpg\"><img src=\"/b.jpg\">");
        load_all_now(&host);
        assert!(host.select(LAZY_SELECTOR).is_none());
        assert_eq!(
            host.select_all("img")
                .iter()
                .filter_map(|i| host.attribute(i, "src"))
                .collect::<Vec<_>>(),
            vec!["/a.jpg", "/b.jpg"]
        );
    }
}
