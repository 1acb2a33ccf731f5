use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::staleness::StalenessTimer;

fn counting_timer(
    window: Duration,
    token: CancellationToken,
) -> (StalenessTimer, Arc<AtomicUsize>) {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let timer = StalenessTimer::spawn(window, token, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (timer, fired)
}

#[tokio::test(start_paused = true)]
async fn test_fires_once_after_window() {
    let (_timer, fired) = counting_timer(Duration::from_secs(5), CancellationToken::new());

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Stays stale without re-firing until something changes
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_touch_resets_window() {
    let (timer, fired) = counting_timer(Duration::from_secs(5), CancellationToken::new());

    tokio::time::sleep(Duration::from_secs(4)).await;
    timer.touch();
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rearms_after_change() {
    let (timer, fired) = counting_timer(Duration::from_secs(5), CancellationToken::new());

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    timer.touch();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_timer_never_fires() {
    let token = CancellationToken::new();
    let (_timer, fired) = counting_timer(Duration::from_secs(5), token.clone());

    token.cancel();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_timer_never_fires() {
    let (timer, fired) = counting_timer(Duration::from_secs(5), CancellationToken::new());

    drop(timer);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
