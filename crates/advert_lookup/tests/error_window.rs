// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `ErrorWindow`.

use std::time::Duration;

use advert_lookup::{ErrorWindow, MAX_AGE};
use tokio::time::Instant;

const MINUTE: Duration = Duration::from_secs(60);

async fn two_hours_in() -> Instant {
    tokio::time::advance(2 * MAX_AGE).await;
    Instant::now()
}

#[tokio::test(start_paused = true)]
async fn counts_only_errors_of_the_last_hour() {
    let now = two_hours_in().await;
    let window = ErrorWindow::new();

    window.record(now - 61 * MINUTE).unwrap();
    window.record(now - 30 * MINUTE).unwrap();

    assert_eq!(window.count_in_last_hour(now).unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn counts_distinct_instants() {
    let now = two_hours_in().await;
    let window = ErrorWindow::new();

    for minutes in [5, 10, 10, 20, 59, 5] {
        window.record(now - minutes * MINUTE).unwrap();
    }

    assert_eq!(window.count_in_last_hour(now).unwrap(), 4);
}

#[tokio::test(start_paused = true)]
async fn errors_age_out_while_idle() {
    let now = two_hours_in().await;
    let window = ErrorWindow::new();

    window.record(now - 50 * MINUTE).unwrap();
    window.record(now - 20 * MINUTE).unwrap();
    window.record(now).unwrap();

    tokio::time::sleep(15 * MINUTE).await;
    assert_eq!(window.tracked(), 2);
    assert_eq!(window.count_recent().unwrap(), 2);

    tokio::time::sleep(30 * MINUTE).await;
    assert_eq!(window.tracked(), 1);

    tokio::time::sleep(20 * MINUTE).await;
    assert_eq!(window.tracked(), 0);
    assert_eq!(window.count_recent().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn window_refills_after_emptying() {
    let window = ErrorWindow::new();

    window.record(Instant::now()).unwrap();
    tokio::time::sleep(MAX_AGE + MINUTE).await;
    assert_eq!(window.tracked(), 0);

    window.record(Instant::now()).unwrap();
    assert_eq!(window.count_recent().unwrap(), 1);

    tokio::time::sleep(MAX_AGE + MINUTE).await;
    assert_eq!(window.tracked(), 0);
}

#[tokio::test(start_paused = true)]
async fn closed_window_is_disposed() {
    let window = ErrorWindow::new();
    window.record(Instant::now()).unwrap();

    window.close();

    let error = window.count_recent().unwrap_err();
    assert!(error.is_disposed());
    assert_eq!(error.to_string(), "this error window has been shut down");
}
