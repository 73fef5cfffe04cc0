// 该文件是 Shanbao （山豹） 项目的一部分。
// src/lib.rs - 库主文件
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! 视频流上的豹类检测告警。
//!
//! 前台捕获循环读取并缩放帧，后台推理线程串行运行检测模型；
//! 两者之间只通过两个容量为一的覆盖式信箱交换最新帧，
//! 检测事件经冷却门控写入追加式记录文件，最近记录时间戳持久化以跨重启去重。

pub mod alarm;
pub mod capture;
pub mod detector;
pub mod input;
pub mod output;
pub mod scale;
pub mod slot;
pub mod state;
pub mod worker;
