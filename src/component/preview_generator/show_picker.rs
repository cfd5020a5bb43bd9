use crate::catalog::CatalogEntry;
use anyhow::Result;
use console::{Term, style};
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;

/// 手動模式的節目選擇
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowSelection {
    All,
    One(usize),
}

/// 顯示節目清單讓使用者選擇；按 ESC 回傳 `None`
pub fn pick_show(term: &Term, shows: &[CatalogEntry]) -> Result<Option<ShowSelection>> {
    println!("{}", style("=== 選擇要產生預覽的節目 ===").cyan().bold());
    println!("{}", style("按 ESC 結束程式").dim());

    let mut options = Vec::with_capacity(shows.len() + 1);
    options.push("全部節目".to_string());
    options.extend(shows.iter().map(|show| show.title().to_string()));

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("節目")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    Ok(selection.map(|index| match index {
        0 => ShowSelection::All,
        n => ShowSelection::One(n - 1),
    }))
}

/// 取出選擇項目所屬節目的 guid（去除重複）
#[must_use]
pub fn selected_guids(shows: &[CatalogEntry], selection: ShowSelection) -> Vec<String> {
    let picked: &[CatalogEntry] = match selection {
        ShowSelection::All => shows,
        ShowSelection::One(index) => shows.get(index..=index).unwrap_or_default(),
    };

    let mut guids: Vec<String> = Vec::new();
    for guid in picked.iter().filter_map(CatalogEntry::show_guid) {
        if !guids.iter().any(|g| g == guid) {
            guids.push(guid.to_string());
        }
    }
    guids
}
