//! 标准输入指令
//!
//! 每行一条：
//!
//! ```text
//! 0.1 -0.2 0 0        舵机指令（最多 4 个舵角，rad）
//! servos 0.1, -0.2    同上
//! feedback a b c d e  写入 5 个舵机反馈值
//! stats               打印运行指标
//! quit                退出
//! ```

use paravane_driver::ServosInput;
use paravane_protocol::SERVO_CHANNELS;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Servos(ServosInput),
    Feedback([f32; SERVO_CHANNELS]),
    Stats,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        match head.to_ascii_lowercase().as_str() {
            "" => Err("empty command".to_string()),
            "stats" => Ok(ConsoleCommand::Stats),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            "servos" => rest.parse().map(ConsoleCommand::Servos),
            "feedback" | "fb" => {
                let values: Vec<f32> = rest
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|t| !t.is_empty())
                    .map(|t| t.parse::<f32>().map_err(|e| format!("invalid feedback `{}`: {}", t, e)))
                    .collect::<Result<_, _>>()?;
                let feedback: [f32; SERVO_CHANNELS] = values.try_into().map_err(|v: Vec<f32>| {
                    format!("feedback needs {} values, got {}", SERVO_CHANNELS, v.len())
                })?;
                Ok(ConsoleCommand::Feedback(feedback))
            },
            // 裸数字行即舵机指令
            _ => line.parse().map(ConsoleCommand::Servos),
        }
    }
}
