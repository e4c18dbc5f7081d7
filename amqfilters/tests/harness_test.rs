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

use amqfilters::cuckoo::CuckooFilter;
use amqfilters::harness::RunOptions;
use amqfilters::harness::ThreadedRun;
use amqfilters::harness::WriteSync;
use amqfilters::harness::run_threaded;
use amqfilters::harness::run_workload;
use amqfilters::quotient::QuotientFilter;
use amqfilters::workload::Operation;
use amqfilters::workload::WorkloadGenerator;
use amqfilters::workload::WorkloadType;
use amqfilters::workload::make_disjoint_keys;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::ge;

#[test]
fn test_churn_workload_on_quotient_filter() {
    let (positives, negatives) = make_disjoint_keys(2_000, 8);
    let mut filter = QuotientFilter::builder()
        .with_accuracy(4_000, 0.01)
        .build()
        .unwrap();
    let ops = WorkloadGenerator::new(WorkloadType::Churn.mix(), 0.5, 77)
        .unwrap()
        .generate(10_000, &positives, &negatives)
        .unwrap();
    let deletes = ops
        .iter()
        .filter(|op| matches!(op, Operation::Delete(_)))
        .count();

    let options = RunOptions::for_filter(&filter);
    let result = run_workload(&mut filter, &ops, options);
    assert_eq!(result.ops, 10_000);
    assert_eq!(result.failed_inserts, 0);
    assert_eq!(result.unsupported_ops, 0);
    assert!(deletes > 0);
    assert_that!(result.negative_queries, ge(result.false_positives));
}

#[test]
fn test_threaded_read_only_matches_op_count() {
    let (positives, negatives) = make_disjoint_keys(1_000, 9);
    let mut filter = CuckooFilter::builder()
        .with_accuracy(1_000, 0.01)
        .build()
        .unwrap();
    for &key in &positives {
        filter.insert(key).unwrap();
    }
    let run = ThreadedRun {
        threads: 4,
        total_ops: 1_003,
        mix: WorkloadType::ReadOnly.mix(),
        negative_share: 0.5,
        write_sync: WriteSync::Coarse,
    };
    let result = run_threaded(&mut filter, &run, &positives, &negatives).unwrap();
    assert_eq!(result.ops, 1_003);
    assert_eq!(result.failed_inserts, 0);
    assert_eq!(filter.insert_calls(), 1_000);
}

#[test]
fn test_workload_needs_keys() {
    let err = WorkloadGenerator::new(WorkloadType::Balanced.mix(), 0.0, 1)
        .unwrap()
        .generate(10, &[], &[])
        .unwrap_err();
    assert_that!(err.to_string(), contains_substring("positive keys"));
}
