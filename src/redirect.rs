// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 重定向跟随模块
//!
//! 客户端的核心驱动：按顺序发起交换，遇到 3xx（304 除外）且带 `Location` 时
//! 解析新地址、关闭旧连接、再次请求，直到拿到最终响应或用尽重定向预算。
//!
//! ## 状态机
//! ```text
//! Requesting --(非3xx / 304 / 未启用跟随 / 缺少Location)--> Done
//! Requesting --(3xx 且有Location 且预算未用尽)----------> Redirecting --> Requesting
//! Requesting --(3xx 但预算已用尽)---------------------> Failed
//! ```
//! `Failed` 不是错误：调用方仍然拿到最后一次收到的响应。

use std::time::Duration;

use log::{debug, error, info, warn};

use crate::{
    codec::{HttpMessage, OutboundRequest},
    config::ClientConfig,
    connection,
    exception::Exception,
    resolver::{self, ParsedUrl},
};

/// 跟随过程所处的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    Requesting,
    Redirecting,
    Done,
    Failed,
}

/// 重定向链中的一步，每次交换追加一条。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectStep {
    pub url: String,
    pub status_code: u16,
    pub reason: String,
}

impl RedirectStep {
    fn record(url: &ParsedUrl, response: &HttpMessage) -> Self {
        Self {
            url: url.to_string(),
            status_code: response.status_code().unwrap_or(0),
            reason: response.reason().unwrap_or_default().to_string(),
        }
    }
}

/// 一次顶层请求的结果
#[derive(Debug, Clone)]
pub struct FollowOutcome {
    /// 最后一次收到的响应
    pub response: HttpMessage,
    /// 产生最后一次响应的 URL
    pub final_url: ParsedUrl,
    /// 每次交换一条记录，按发生顺序排列
    pub trace: Vec<RedirectStep>,
    /// 终止状态：`Done` 或 `Failed`
    pub state: FollowState,
}

/// 收到一个响应之后的下一步
#[derive(Debug, PartialEq, Eq)]
enum Transition {
    Finish,
    Follow(String),
    Exhausted,
}

/// 跟随重定向链的客户端。
#[derive(Debug, Clone)]
pub struct RedirectFollower {
    timeout: Duration,
    buffer_size: usize,
    max_redirects: usize,
    follow_redirects: bool,
    user_agent: String,
}

impl RedirectFollower {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs()),
            buffer_size: config.buffer_size(),
            max_redirects: config.max_redirects(),
            follow_redirects: true,
            user_agent: config.user_agent().to_string(),
        }
    }

    pub fn follow_redirects(mut self, enabled: bool) -> Self {
        self.follow_redirects = enabled;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 请求 `raw_url` 并按需跟随重定向。
    ///
    /// 最多进行 `max_redirects + 1` 次交换。任何一次交换失败都会以该错误结束整个调用。
    pub async fn fetch(&self, raw_url: &str) -> Result<FollowOutcome, Exception> {
        let mut current = resolver::resolve(raw_url)?;
        let mut trace = Vec::new();
        let mut attempt = 0;
        let mut state = FollowState::Requesting;

        loop {
            if attempt > 0 {
                info!("跟随重定向（第{}/{}次）：{}", attempt, self.max_redirects, current);
            }
            debug!("状态：{:?}，请求{}", state, current);

            let request = OutboundRequest::get(&current, &self.user_agent);
            let response =
                connection::exchange(&current, &request, self.timeout, self.buffer_size).await?;
            trace.push(RedirectStep::record(&current, &response));

            match self.next_transition(&response, attempt) {
                Transition::Finish => {
                    return Ok(FollowOutcome {
                        response,
                        final_url: current,
                        trace,
                        state: FollowState::Done,
                    });
                }
                Transition::Exhausted => {
                    error!(
                        "已达到最大重定向次数（{}），返回最后一次收到的响应",
                        self.max_redirects
                    );
                    return Ok(FollowOutcome {
                        response,
                        final_url: current,
                        trace,
                        state: FollowState::Failed,
                    });
                }
                Transition::Follow(location) => {
                    state = FollowState::Redirecting;
                    debug!("状态：{:?}，Location: {}", state, location);
                    current = resolver::join(&current, &location)?;
                    attempt += 1;
                    state = FollowState::Requesting;
                }
            }
        }
    }

    fn next_transition(&self, response: &HttpMessage, attempt: usize) -> Transition {
        let code = match response.status_code() {
            Some(c) => c,
            None => return Transition::Finish,
        };
        if !self.follow_redirects || !(300..400).contains(&code) || code == 304 {
            return Transition::Finish;
        }
        let location = match response.header("location") {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => {
                warn!("收到{}重定向响应，但没有Location头", code);
                return Transition::Finish;
            }
        };
        if attempt >= self.max_redirects {
            return Transition::Exhausted;
        }
        Transition::Follow(location)
    }
}
