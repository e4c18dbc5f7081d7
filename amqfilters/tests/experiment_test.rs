// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use amqfilters::experiment::ExperimentConfig;
use amqfilters::experiment::Phase;
use amqfilters::experiment::run_full;
use amqfilters::experiment::run_sanity;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::eq;

fn tiny() -> ExperimentConfig {
    let mut config = ExperimentConfig::quick().with_trials(2);
    config.sanity_n = 2_000;
    config.simple_n = 1_000;
    config.simple_ops = 2_000;
    config.negative_shares = vec![0.5];
    config.dynamic_n = 1_000;
    config.dynamic_keys = 5_000;
    config.load_factors = vec![0.5];
    config.threaded_n = 1_000;
    config.threaded_ops = 2_000;
    config.thread_counts = vec![2];
    config.space_ns = vec![1_000];
    config.space_fprs = vec![0.01];
    config
}

#[test]
fn test_full_report_shape() {
    let report = run_full(&tiny()).unwrap();

    assert_that!(report.simple.len(), eq(4));
    // cuckoo and quotient, insert and delete phases
    assert_that!(report.dynamic.len(), eq(4));
    // 4 filters x 2 workloads
    assert_that!(report.threaded.len(), eq(8));
    assert_that!(report.space.len(), eq(4));

    assert!(report.simple.iter().all(|r| r.ops == 2_000 && r.neg_share == 0.5));
    assert_eq!(report.dynamic[0].phase, Phase::Insert);
    assert_eq!(report.dynamic[1].phase, Phase::Delete);
    assert_eq!(report.dynamic[0].filter, "cuckoo");
    assert_eq!(report.dynamic[2].filter, "quotient");
    assert!(report.threaded.iter().all(|r| r.threads == 2));
    assert!(report.space.iter().all(|r| r.achieved_fpr < 0.05));
}

#[test]
fn test_sanity_records() {
    let records = run_sanity(&tiny()).unwrap();
    for record in records {
        assert!(record.built, "{}", record.filter);
        assert_eq!(record.misses, 0, "{}", record.filter);
        assert_eq!(record.n, 2_000);
    }
}

#[test]
fn test_invalid_config_is_reported() {
    let mut config = tiny();
    config.negative_shares = vec![1.5];
    let err = run_sanity(&config).unwrap_err();
    assert_that!(err.to_string(), contains_substring("ConfigInvalid"));
    assert_that!(err.to_string(), contains_substring("negative_share: 1.5"));
}
