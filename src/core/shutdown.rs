//! 中断处理
//!
//! Ctrl+C（以及 Unix 下的 SIGTERM）触发取消令牌；编排器在每个任务开始前与退避等待中检查令牌，
//! 以 Cancelled 结束而不是部分成功。

use tokio_util::sync::CancellationToken;

/// 安装信号处理器，收到信号时取消 token
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            tracing::info!("Received Ctrl+C, cancelling generation...");
            ctrl_c_token.cancel();
        }
    });

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, cancelling generation...");
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handlers_leave_token_untouched_without_signal() {
        let token = CancellationToken::new();
        cancel_on_ctrl_c(token.clone());
        tokio::task::yield_now().await;
        assert!(!token.is_cancelled());
    }
}
