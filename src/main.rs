use anyhow::Context;
use clap::Parser;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use menu_allergen_common::{
    presets_for, preset_rules, Conversion, MealSlot, MenuProcessor, SuggestionMap, SubstitutionRule,
    KNOWN_ALLERGENS,
};
use menu_allergen_rust::{cli, config, error, export, rule_store, suggest, table_io};
use cli::{Cli, Commands, OutputFormat, RulesAction};
use config::Config;
use error::MenuAllergenError;
use rule_store::RuleStore;
use std::path::{Path, PathBuf};
use std::time::Duration;
use suggest::{cache_key, CachingService, CliSuggestionService, SuggestionCache};
use table_io::TableFormat;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("設定ファイルを読み込めません")?;
    let rules_path = match &cli.rules_file {
        Some(path) => path.clone(),
        None => RuleStore::default_path()?,
    };

    match cli.command {
        Commands::Convert {
            input,
            output,
            allergens,
            no_ai,
            use_cache,
            with_presets,
            report,
            format,
        } => {
            println!("🍽  menu-allergen - 献立変換\n");

            // 1. 読み込みと構造検出
            println!("[1/4] 献立表を読み込み中...");
            let table = table_io::read_table(&input)?;
            let processor = MenuProcessor::new(table)
                .with_context(|| format!("{} の献立表を解析できません", input.display()))?;
            println!(
                "✔ {}週 x {}日 の献立を検出\n",
                processor.layout().week_columns.len(),
                processor.layout().day_rows.len()
            );

            let allergens = if allergens.is_empty() {
                config.default_allergens.clone()
            } else {
                allergens
            };
            let allergens: Vec<String> = allergens
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();

            let store = RuleStore::open(&rules_path)?;
            let mut custom_rules = store.custom_rules();
            if with_presets {
                custom_rules.extend(presets_for(&allergens));
            }

            // 2. 提案取得と置換
            println!(
                "[2/4] 置換中... (アレルゲン: {} / カスタムルール: {}件)",
                if allergens.is_empty() { "なし".to_string() } else { allergens.join(", ") },
                custom_rules.len()
            );
            let conversion = if no_ai {
                processor.convert(&custom_rules, &allergens, SuggestionMap::new())
            } else {
                let provider = cli.ai_provider.unwrap_or(config.ai_provider);
                let service = CliSuggestionService::new(provider, &config)?;
                run_with_service(&processor, &service, &custom_rules, &allergens, use_cache, &input)?
            };
            println!(
                "✔ {}件の置換 (AI提案 {}件)\n",
                conversion.provenance.len(),
                conversion.suggestions.len()
            );

            // 3. 変更ログ
            println!("[3/4] 変更ログ");
            print_changes(&conversion);

            // 4. 出力
            println!("[4/4] 出力中...");
            let format = resolve_format(format, output.as_deref());
            let output = output.unwrap_or_else(|| export::default_output_path(&input, format));
            export::export_conversion(&conversion, format, &output)?;
            println!("✔ 出力: {}", output.display());

            if let Some(report_path) = report {
                export::write_report(&conversion, &report_path)?;
                println!("✔ レポート: {}", report_path.display());
            }

            print_summary(&conversion);
            println!("\n✅ 変換完了");
        }

        Commands::Inspect { input } => {
            println!("🔍 menu-allergen - 構造確認\n");
            let table = table_io::read_table(&input)?;
            let processor = MenuProcessor::new(table)
                .with_context(|| format!("{} の献立表を解析できません", input.display()))?;

            for week in &processor.layout().week_columns {
                let header = week
                    .header_number
                    .map(|n| format!(" (見出し: Week {})", n))
                    .unwrap_or_default();
                println!("  Week {}: 列{}{}", week.week, week.col + 1, header);
            }
            for day in &processor.layout().day_rows {
                println!("  {}: 行{}", day.day, day.row + 1);
            }
            println!();
            for cell in processor.meal_cells() {
                println!("■ {}", cell.coord);
                for (slot, text) in cell.meal_parts() {
                    println!("  {}: {}", slot.code(), text);
                }
            }
            println!("\n食材: {}種類", processor.ingredient_table().len());
        }

        Commands::Rules { action } => {
            let mut store = RuleStore::open(&rules_path)?;
            match action {
                RulesAction::Add {
                    allergen,
                    original,
                    replacement,
                } => {
                    let allergen = prompt_if_missing(allergen, "アレルゲン")?;
                    let original = prompt_if_missing(original, "置換元")?;
                    let replacement = prompt_if_missing(replacement, "置換先")?;
                    let rule = store.create(&allergen, &original, &replacement)?;
                    println!(
                        "✔ ルールを追加しました: #{} [{}] {} → {}",
                        rule.id, rule.allergen, rule.original, rule.replacement
                    );
                }
                RulesAction::List => {
                    if store.list().is_empty() {
                        println!("ルールがありません: {}", store.path().display());
                    }
                    for rule in store.list() {
                        println!(
                            "#{:<4} [{}] {} → {}  ({})",
                            rule.id,
                            rule.allergen,
                            rule.original,
                            rule.replacement,
                            rule.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
                RulesAction::Delete { id } => {
                    let removed = store.delete(id)?;
                    println!("✔ ルールを削除しました: #{} {}", removed.id, removed.original);
                }
                RulesAction::Presets { allergen } => {
                    let names: Vec<String> = match allergen {
                        Some(name) => vec![name],
                        None => KNOWN_ALLERGENS.iter().map(|a| a.to_string()).collect(),
                    };
                    for name in names {
                        match preset_rules(&name) {
                            Some(rules) => print_preset(&name, &rules),
                            None => println!("組み込みルールなし: {}", name),
                        }
                    }
                }
            }
        }

        Commands::Config { set_model, set_provider, show } => {
            let mut config = config;
            let mut changed = false;

            if let Some(model) = set_model {
                config.model = model;
                changed = true;
            }
            if let Some(provider) = set_provider {
                config.ai_provider = provider;
                changed = true;
            }
            if changed {
                config.save()?;
                println!("✔ 設定を保存しました: {}", Config::config_path()?.display());
            }

            if show || !changed {
                println!("設定:");
                println!("  AIプロバイダ: {}", config.ai_provider.command_name());
                println!("  モデル: {}", config.model().unwrap_or("(プロバイダ既定)"));
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!(
                    "  再試行: {}回 (初回待機 {}秒)",
                    config.max_retries, config.retry_delay_seconds
                );
                println!(
                    "  既定アレルゲン: {}",
                    if config.default_allergens.is_empty() {
                        "なし".to_string()
                    } else {
                        config.default_allergens.join(", ")
                    }
                );
                println!("  ルールファイル: {}", rules_path.display());
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = SuggestionCache::cache_path(&target);

            if info || !clear {
                if cache_path.exists() {
                    let cache = SuggestionCache::load(&target);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match SuggestionCache::clear(&target) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}

/// 提案サービス経由で変換（スピナーに応答を流す）
fn run_with_service(
    processor: &MenuProcessor,
    service: &CliSuggestionService,
    custom_rules: &[SubstitutionRule],
    allergens: &[String],
    use_cache: bool,
    input: &Path,
) -> error::Result<Conversion> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("{} に問い合わせ中...", service.provider().command_name()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut progress = |chunk: &str| {
        let preview: String = chunk.chars().take(60).collect();
        if !preview.trim().is_empty() {
            spinner.set_message(preview);
        }
    };

    let conversion = if use_cache {
        let folder = cache_folder(input);
        let cache = SuggestionCache::load(&folder);
        let key = cache_key(
            &processor.fingerprint(allergens, custom_rules),
            service.provider(),
            service.model(),
        );
        let caching = CachingService::new(service, cache, key);
        let conversion = processor.convert_menu(custom_rules, allergens, &caching, &mut progress);
        if caching.was_hit() {
            spinner.println("  (キャッシュ使用)");
        }
        caching.into_cache().save(&folder)?;
        conversion
    } else {
        processor.convert_menu(custom_rules, allergens, service, &mut progress)
    };

    spinner.finish_and_clear();
    Ok(conversion)
}

fn cache_folder(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn resolve_format(format: Option<OutputFormat>, output: Option<&Path>) -> TableFormat {
    match format {
        Some(OutputFormat::Excel) => TableFormat::Excel,
        Some(OutputFormat::Csv) => TableFormat::Csv,
        None => output
            .and_then(|path| TableFormat::from_path(path).ok())
            .unwrap_or(TableFormat::Excel),
    }
}

fn prompt_if_missing(value: Option<String>, label: &str) -> error::Result<String> {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        return Ok(value);
    }
    Input::new()
        .with_prompt(label)
        .interact_text()
        .map_err(|e| MenuAllergenError::CliExecution(e.to_string()))
}

fn print_changes(conversion: &Conversion) {
    let changes = conversion.changes();
    if changes.is_empty() {
        println!("  (変更なし)");
    }
    for line in changes {
        println!("  - {}", line);
    }
    println!();
}

fn print_summary(conversion: &Conversion) {
    let summary = &conversion.summary;
    println!("\nサマリ:");
    for slot in MealSlot::ALL {
        println!("  {}: {}件置換", slot, summary.replaced_count(slot));
    }
    if !summary.unreplaced.is_empty() {
        println!("  置換なし: {}区分", summary.unreplaced.len());
        for item in &summary.unreplaced {
            println!("    Week {} {} {}: {}", item.week, item.day, item.slot, item.text);
        }
    }
}

fn print_preset(name: &str, rules: &[SubstitutionRule]) {
    println!("■ {}", name);
    for rule in rules {
        println!("  {} → {}", rule.original, rule.replacement);
    }
}
