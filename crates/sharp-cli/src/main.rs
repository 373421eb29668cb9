//! Sharp 시그널 엔진 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 1시간봉/4시간봉/일봉 CSV로 결정적 리플레이
//! sharp replay -s BTCUSDT -d 1h=data/btc_1h.csv -d 4h=data/btc_4h.csv -d 1d=data/btc_1d.csv
//!
//! # 시그널을 JSON Lines 파일로 저장
//! sharp replay -d 1h=data/btc_1h.csv -o signals.jsonl
//!
//! # 설정 검증 (환경 변수 오버라이드 포함)
//! sharp validate-config -c config/default.toml --print
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use sharp_core::{init_logging, LoggingConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

use sharp_cli::commands::replay::{run_replay, ReplayOptions, TierInput};
use sharp_cli::commands::validate::{describe, validate_config};

#[derive(Parser)]
#[command(name = "sharp")]
#[command(about = "Sharp signal engine - SMC 시장 구조 분석 및 시그널 스코어링", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// CSV 캔들 파일로 결정적 리플레이
    Replay {
        /// 설정 파일 (없으면 기본값 + SHARP__ 환경 변수)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 심볼 (기본: 설정의 첫 번째 심볼)
        #[arg(short, long)]
        symbol: Option<String>,

        /// 타임프레임별 입력 파일 (예: 1h=data/btc_1h.csv, 여러 번 지정)
        #[arg(short, long = "data", required = true)]
        data: Vec<TierInput>,

        /// 시그널 출력 경로 (JSON Lines, 기본: 표준 출력)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 진행률 표시 끄기
        #[arg(long, default_value = "false")]
        no_progress: bool,
    },

    /// 설정 파일 검증
    ValidateConfig {
        /// 설정 파일
        #[arg(short, long, default_value = "config/default.toml")]
        config: PathBuf,

        /// 병합된 최종 설정을 TOML로 출력
        #[arg(long, default_value = "false")]
        print: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            config,
            symbol,
            data,
            output,
            no_progress,
        } => {
            let engine_config = validate_config(config.as_deref())?;
            init_logging(engine_config.logging.to_log_config()).map_err(|e| anyhow!(e))?;
            info!(inputs = data.len(), "리플레이 시작");

            let options = ReplayOptions {
                symbol,
                inputs: data,
                progress: !no_progress,
            };

            let summary = match &output {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    let mut writer = BufWriter::new(file);
                    run_replay(engine_config, &options, &mut writer).await?
                }
                None => {
                    let stdout = io::stdout();
                    let mut writer = stdout.lock();
                    let summary = run_replay(engine_config, &options, &mut writer).await?;
                    writer.flush()?;
                    summary
                }
            };

            // 표준 출력이 시그널 스트림이면 요약은 stderr로
            match output {
                Some(path) => {
                    summary.write_to(&mut io::stdout())?;
                    println!("\n📁 시그널 저장됨: {}", path.display());
                }
                None => summary.write_to(&mut io::stderr())?,
            }
        }

        Commands::ValidateConfig { config, print } => {
            init_logging(LoggingConfig::default().to_log_config()).map_err(|e| anyhow!(e))?;

            let engine_config = validate_config(Some(&config))?;
            println!("✅ 설정 검증 완료: {}", config.display());
            for line in describe(&engine_config) {
                println!("{}", line);
            }
            if print {
                println!("\n{}", engine_config.to_toml()?);
            }
        }
    }

    Ok(())
}
