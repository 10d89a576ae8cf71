//! Toast lifetimes on a paused clock

use genview::{Page, Severity, ToastTiming, Toaster};
use std::time::Duration;
use tokio::time::sleep;

fn page() -> Page {
    genview::pages::generator_page().unwrap()
}

#[tokio::test(start_paused = true)]
async fn toasts_expire_independently() {
    let page = page();
    let toaster = Toaster::attach(&page, ToastTiming::default()).unwrap();

    let first = toaster.success("first");
    sleep(Duration::from_millis(1000)).await;
    let second = toaster.error("second");
    let third = toaster.info("third");
    assert_eq!(toaster.active_count(), 3);

    // t = 5350: only the first toast has run its course
    sleep(Duration::from_millis(4350)).await;
    assert!(!page.with(|d| d.contains(first)));
    let left: Vec<String> = toaster.messages().into_iter().map(|m| m.text).collect();
    assert_eq!(left, vec!["second", "third"]);
    assert!(page.with(|d| d.has_class(second, "show") && d.has_class(third, "show")));

    // t = 6350
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(toaster.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn same_message_twice_gives_two_toasts() {
    let page = page();
    let toaster = Toaster::attach(&page, ToastTiming::default()).unwrap();
    let a = toaster.warning("No images generated");
    let b = toaster.warning("No images generated");
    assert_ne!(a, b);
    assert_eq!(toaster.active_count(), 2);
    assert!(toaster
        .messages()
        .iter()
        .all(|m| m.severity == Severity::Warning));

    sleep(ToastTiming::default().total() + Duration::from_millis(1)).await;
    assert_eq!(toaster.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn custom_timing_is_honored() {
    let page = page();
    let timing = ToastTiming {
        show_delay: Duration::from_millis(10),
        lifetime: Duration::from_millis(200),
        fade: Duration::from_millis(50),
    };
    let toaster = Toaster::attach(&page, timing).unwrap();
    let node = toaster.info("quick");

    sleep(Duration::from_millis(20)).await;
    assert!(page.with(|d| d.has_class(node, "show")));
    sleep(Duration::from_millis(200)).await; // t = 220
    assert!(!page.with(|d| d.has_class(node, "show")));
    assert!(page.with(|d| d.contains(node)));
    sleep(Duration::from_millis(40)).await; // t = 260
    assert!(!page.with(|d| d.contains(node)));
}

#[tokio::test(start_paused = true)]
async fn clearing_the_container_early_is_harmless() {
    let page = page();
    let toaster = Toaster::attach(&page, ToastTiming::default()).unwrap();
    toaster.error("gone soon");
    let container = page.require(genview::toast::TOAST_CONTAINER_ID).unwrap();
    page.with(|d| d.clear_children(container));
    assert_eq!(toaster.active_count(), 0);

    sleep(Duration::from_secs(6)).await;
    assert_eq!(toaster.active_count(), 0);
    let again = toaster.success("still works");
    assert!(page.with(|d| d.contains(again)));
}
