use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

use crate::hub::core::status::{Properties, Response};

pub const DEFAULT_METRICS_CAPACITY: usize = 100;

/// 一条带时间戳的数据快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub time: DateTime<Utc>,

    #[serde(flatten)]
    pub data: Properties,
}

impl Metric {
    /// 从设备回复生成快照，去掉内部状态字段
    pub fn from_response(response: &Response) -> Self {
        Self {
            time: Utc::now(),
            data: response.clone().into_entry(),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// 有界的历史数据，满了以后丢弃最旧的一条
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    entries: VecDeque<Metric>,
    capacity: usize,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, metric: Metric) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(metric);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.entries.iter()
    }

    pub fn to_json(&self) -> Vec<Value> {
        self.entries.iter().map(Metric::to_json).collect()
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(DEFAULT_METRICS_CAPACITY)
    }
}
