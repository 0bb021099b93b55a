/*! Integration tests for Docbranch.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * One module per area:
 * - list: Tests for the List container, its reads and batched resolution
 * - ownership: Tests for ObjectField owner tracking across documents and lists
 * - diff: Tests for list diffs, mirrors and persistence patches
 * - store: Tests for the Store cache, materialization and file persistence
 * - branch: Tests for branch creation, pull, merge and the task driver
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("docbranch=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod branch;
mod helpers;
mod ownership;
mod store;
