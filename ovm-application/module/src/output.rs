//! 模块结果输出
//!
//! Ansible 从 stdout 读取唯一一个 JSON 对象；日志全部写到 stderr。

use std::process::ExitCode;

use ovm_restapi::OperationResult;

/// 将执行错误转换为失败结果
pub fn from_error(err: &anyhow::Error) -> OperationResult {
    OperationResult::failure(format!("{:#}", err))
}

/// 序列化结果
pub fn render(result: &OperationResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|e| {
        serde_json::json!({
            "changed": false,
            "failed": true,
            "msg": format!("序列化结果失败: {}", e),
        })
        .to_string()
    })
}

/// 进程退出码：失败为 1，其余为 0
pub fn exit_code(result: &OperationResult) -> u8 {
    if result.failed {
        1
    } else {
        0
    }
}

/// 打印结果并返回进程退出码
pub fn emit(result: &OperationResult) -> ExitCode {
    println!("{}", render(result));
    ExitCode::from(exit_code(result))
}
