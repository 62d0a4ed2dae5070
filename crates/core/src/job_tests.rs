// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn config_with_stdin(stdin: StdioSpec) -> JobConfig {
    JobConfig {
        cmdline: vec!["/bin/true".to_string()],
        user: None,
        cwd: None,
        env: HashMap::new(),
        stdin,
        stdout: StdioSpec::Inherit,
        stderr: StdioSpec::Inherit,
    }
}

#[test]
fn job_with_piped_stdin_tracks_that_it_has_a_pipe() {
    let job = JobRecord::new(100, config_with_stdin(StdioSpec::Piped));
    assert!(job.has_stdin_pipe);
}

#[test]
fn job_without_piped_stdin_tracks_that_it_does_not() {
    let job = JobRecord::new(100, config_with_stdin(StdioSpec::Inherit));
    assert!(!job.has_stdin_pipe);
}
