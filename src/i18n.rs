// ==========================================
// 采购授标引擎 - 提示文案本地化
// ==========================================
// 文案: locales/zh-CN.yml（回退语言）、locales/en.yml
// 占位符: %{name}
// 注意: rust_i18n::i18n! 宏在 lib.rs 中初始化；语言为进程级全局状态
// ==========================================

/// 已提供文案的语言
pub const SUPPORTED_LOCALES: [&str; 2] = ["zh-CN", "en"];

/// 当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 切换语言；不支持的语言返回 false 且不改变当前设置
pub fn set_locale(locale: &str) -> bool {
    match SUPPORTED_LOCALES.iter().find(|l| l.eq_ignore_ascii_case(locale.trim())) {
        Some(supported) => {
            rust_i18n::set_locale(supported);
            true
        }
        None => {
            tracing::warn!(locale, "不支持的语言，保持当前设置");
            false
        }
    }
}

pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 带参数翻译
///
/// ```no_run
/// let msg = procurement_engine::i18n::t_with_args("award.promoted", &[("vendor", "V-002")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(t(key), |text, (name, value)| {
        text.replace(&format!("%{{{}}}", name), value)
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    // 语言为全局状态，相关测试串行
    pub(crate) static LOCALE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_switch_between_supported_locales() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        assert!(set_locale("EN"));
        assert_eq!(current_locale(), "en");
        assert!(set_locale("zh-CN"));
        assert_eq!(current_locale(), "zh-CN");
    }

    #[test]
    fn test_unsupported_locale_is_ignored() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("zh-CN");
        assert!(!set_locale("fr"));
        assert_eq!(current_locale(), "zh-CN");
    }

    #[test]
    fn test_placeholders_are_filled() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        set_locale("en");
        let msg = t_with_args("award.promoted", &[("vendor", "V-002")]);
        assert!(msg.contains("V-002"));
        assert!(!msg.contains("%{vendor}"));
        set_locale("zh-CN");
    }

    #[test]
    fn test_missing_key_falls_back_to_key() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        assert!(t("no.such.key").contains("no.such.key"));
    }
}
