// miniSync Connection State Machine + Observer
// author: kodeholic (powered by Claude)
//
// 트랜스포트 세션의 수명주기를 상태 머신으로 관리
// 엔진은 세션을 빌려 쓰기만 하고 열거나 닫지 않음 → 상태 전이는 SshSession만 수행
//
// 상태 흐름:
//   Idle → Connecting → Authenticating → Authenticated
//     → SubsystemOpening → Ready → Closing → Closed
//
//   어느 상태에서든 → Closing, Failed 전이 가능

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Authenticating,
    Authenticated,
    SubsystemOpening,
    Ready,
    Closing,
    Closed,
    Failed {
        state: Box<ConnectionState>,  // 실패 시점의 상태
        message: String,
    },
}

impl ConnectionState {
    /// 허용된 다음 상태인지 검증
    pub fn can_transition_to(&self, next: &ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
            | (Connecting, Authenticating)
            | (Authenticating, Authenticated)
            | (Authenticated, SubsystemOpening)
            | (SubsystemOpening, Ready)
            | (_, Closing)
            | (Closing, Closed)
            | (_, Failed { .. })
        )
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }
}

/// 상태 변경 알림 trait
///
/// CLI: tracing 로그로 상태 출력
/// 테스트: 전이 순서 기록
pub trait ConnectionObserver: Send + Sync {
    fn on_state_changed(&self, prev: &ConnectionState, next: &ConnectionState);
}

/// 기본 observer: debug 레벨 로그만 남김
pub struct TracingObserver;

impl ConnectionObserver for TracingObserver {
    fn on_state_changed(&self, prev: &ConnectionState, next: &ConnectionState) {
        tracing::debug!("[state] {:?} → {:?}", prev, next);
    }
}
