// 该文件是 Shanbao （山豹） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;

/// Shanbao 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, short = 'm', value_name = "FILE")]
  pub model: String,

  /// 视频来源（V4L2 设备索引或路径、图片文件、图片序列目录或视频文件）
  #[arg(long, short = 's', value_name = "SOURCE")]
  pub source: String,

  /// 检测记录输出文件
  #[arg(long, short = 'o', default_value = "./outputTxt/detections.txt", value_name = "FILE")]
  pub out: PathBuf,

  /// 记录行中标注的纬度
  #[arg(long, default_value = "18.5204")]
  pub lat: f64,

  /// 记录行中标注的经度
  #[arg(long, default_value = "73.8567")]
  pub lon: f64,

  /// 记录冷却时长（分钟）
  #[arg(long, default_value = "10.0", value_name = "MINS")]
  pub cooldown_mins: f64,

  /// 最近记录时间戳的状态文件
  #[arg(long, default_value = ".last_logged_ts", value_name = "FILE")]
  pub last_file: PathBuf,

  /// 关闭帧展示
  #[arg(long)]
  pub no_show: bool,

  /// 展示帧写入的预览目录
  #[arg(long, default_value = "./preview", value_name = "DIR")]
  pub preview_dir: PathBuf,

  /// 写入一行测试记录后立即退出
  #[arg(long)]
  pub test_write: bool,

  /// 跳过冷却，每次检测都写入记录
  #[arg(long)]
  pub force_log: bool,

  /// 输出详细诊断信息
  #[arg(long)]
  pub verbose: bool,

  /// 推理与展示的最大帧宽度（像素），超出按比例缩小
  #[arg(long, default_value = "640", value_name = "PX")]
  pub max_width: u32,

  /// 每 N 帧送一帧去推理（1 = 每帧）
  #[arg(long, default_value = "1", value_name = "N")]
  pub skip_frames: u64,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub conf: f32,

  /// 不绘制检测框（更快）
  #[arg(long)]
  pub no_plot: bool,

  /// 最大处理帧数（0 表示无限制）
  #[arg(long, default_value = "0", value_name = "COUNT")]
  pub max_frames: u64,
}
