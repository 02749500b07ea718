//! 论坛页面解析 - 业务能力层
//!
//! 所有 HTML 解析集中在这里，每个函数只提取一个事实。远程站点改版时
//! 最先断的就是这一层，因此用固定页面片段做了最密集的单元测试。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{SignError, SignResult};
use crate::models::SignStats;

/// 签到按钮锚点标签
static SIGN_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a\s[^>]*id="JD_sign"[^>]*>"#).expect("内建正则"));

/// 已签到标记元素
static VISITED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<span\s[^>]*btnvisted"#).expect("内建正则"));

/// 签到按钮 href 中的 formhash
static FORMHASH_IN_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"formhash=([a-f0-9]+)").expect("内建正则"));

/// 验证码图片地址
static CAPTCHA_IMG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img\s[^>]*src="(misc\.php\?mod=seccode[^"]*)""#).expect("内建正则"));

static CLASS_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class="([^"]*)""#).expect("内建正则"));

static ID_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"id="([^"]*)""#).expect("内建正则"));

static VALUE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"value="([^"]*)""#).expect("内建正则"));

/// 今日是否已签到
///
/// 三个相互独立的阳性信号，命中任意一个即视为已签：
/// 1. 页面含 `btnvisted` 标记元素
/// 2. 签到按钮缺失，或带 `disabled` 类
/// 3. 页面含"今日已签"字样
pub fn is_signed(html: &str) -> bool {
    if VISITED_MARKER.is_match(html) {
        return true;
    }

    match SIGN_ANCHOR.find(html) {
        None => true,
        Some(anchor) => {
            let tag = anchor.as_str();
            if let Some(class) = CLASS_ATTR.captures(tag).map(|c| c[1].to_string()) {
                if class.split_whitespace().any(|c| c == "disabled") {
                    return true;
                }
            }
            html.contains("今日已签")
        }
    }
}

/// 从签到按钮链接中提取 formhash
pub fn extract_sign_formhash(html: &str) -> Option<String> {
    let anchor = SIGN_ANCHOR.find(html)?;
    FORMHASH_IN_HREF
        .captures(anchor.as_str())
        .map(|c| c[1].to_string())
}

/// 登录表单中的验证码挑战
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptchaChallenge {
    /// seccodehash，来自验证码输入框的 id 去掉 `seccodeverify_` 前缀
    pub idhash: String,
    /// 验证码图片相对地址
    pub image_src: Option<String>,
}

/// 登录表单的各项事实
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginForm {
    /// 防伪 token
    pub formhash: String,
    pub cookietime: String,
    /// 用户名输入框的随机 id（需要与固定字段名一起提交）
    pub username_field_id: String,
    /// 密码输入框的随机 id
    pub password_field_id: String,
    /// 需要验证码时的挑战信息
    pub captcha: Option<CaptchaChallenge>,
}

/// 解析登录表单页
pub fn parse_login_form(html: &str) -> SignResult<LoginForm> {
    let username_input =
        find_input_by_name(html, "username").ok_or(SignError::ParseMissing("登录表单元素"))?;
    let password_input =
        find_input_by_name(html, "password").ok_or(SignError::ParseMissing("登录表单元素"))?;

    let username_field_id =
        attr_value(&ID_ATTR, &username_input).ok_or(SignError::ParseMissing("登录表单元素"))?;
    let password_field_id =
        attr_value(&ID_ATTR, &password_input).ok_or(SignError::ParseMissing("登录表单元素"))?;

    let formhash = find_input_by_name(html, "formhash")
        .and_then(|tag| attr_value(&VALUE_ATTR, &tag))
        .ok_or(SignError::ParseMissing("formhash"))?;

    let cookietime = find_input_by_name(html, "cookietime")
        .and_then(|tag| attr_value(&VALUE_ATTR, &tag))
        .ok_or(SignError::ParseMissing("cookietime"))?;

    let captcha = find_input_by_name(html, "seccodeverify").map(|tag| {
        let idhash = attr_value(&ID_ATTR, &tag)
            .map(|id| id.trim_start_matches("seccodeverify_").to_string())
            .unwrap_or_default();
        CaptchaChallenge {
            idhash,
            image_src: extract_captcha_src(html),
        }
    });

    Ok(LoginForm {
        formhash,
        cookietime,
        username_field_id,
        password_field_id,
        captcha,
    })
}

/// 提取验证码图片地址（页面实体 `&amp;` 还原为 `&`）
pub fn extract_captcha_src(html: &str) -> Option<String> {
    CAPTCHA_IMG
        .captures(html)
        .map(|c| c[1].replace("&amp;", "&"))
}

/// 抓取签到统计数据
///
/// 五个字段逐个提取，缺失的字段保留 "N/A"，不让单个字段拖垮整次抓取。
pub fn parse_stats(html: &str) -> SignStats {
    let mut stats = SignStats::default();
    if let Some(v) = find_input_value_by_id(html, "lxdays") {
        stats.consecutive_days = v;
    }
    if let Some(v) = find_input_value_by_id(html, "lxlevel") {
        stats.level = v;
    }
    if let Some(v) = find_input_value_by_id(html, "lxreward") {
        stats.reward = v;
    }
    if let Some(v) = find_input_value_by_id(html, "lxtdays") {
        stats.total_days = v;
    }
    if let Some(v) = find_input_value_by_id(html, "qiandaobtnnum") {
        stats.rank = v;
    }
    stats
}

/// 登录响应是否为欢迎回来
pub fn is_login_welcome(html: &str) -> bool {
    html.contains("欢迎您回来")
}

/// 登录响应是否提示验证码错误
pub fn is_wrong_captcha(html: &str) -> bool {
    html.contains("验证码错误")
}

/// 登录响应是否提示密码错误
pub fn is_wrong_password(html: &str) -> bool {
    html.contains("密码错误")
}

/// 首页是否呈现指定账号的已登录状态
pub fn is_home_logged_in(html: &str, username: &str) -> bool {
    html.contains("访问我的空间") && html.contains(username)
}

fn find_input_by_name(html: &str, name: &str) -> Option<String> {
    let pattern = format!(r#"<input\s[^>]*name="{}"[^>]*>"#, regex::escape(name));
    Regex::new(&pattern)
        .ok()?
        .find(html)
        .map(|m| m.as_str().to_string())
}

fn find_input_value_by_id(html: &str, id: &str) -> Option<String> {
    let pattern = format!(r#"<input\s[^>]*id="{}"[^>]*>"#, regex::escape(id));
    let tag = Regex::new(&pattern).ok()?.find(html)?.as_str().to_string();
    attr_value(&VALUE_ATTR, &tag)
}

fn attr_value(pattern: &Regex, tag: &str) -> Option<String> {
    pattern.captures(tag).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::STAT_UNAVAILABLE;

    const UNSIGNED_PAGE: &str = r#"
        <div class="wp">
            <a id="JD_sign" class="btna" href="plugin.php?id=k_misign:sign&operation=qiandao&formhash=a1b2c3d4&format=empty">马上签到</a>
            <input type="hidden" id="lxdays" value="4">
            <input type="hidden" id="lxlevel" value="2">
            <input type="hidden" id="lxreward" value="10">
            <input type="hidden" id="lxtdays" value="49">
            <input type="hidden" id="qiandaobtnnum" value="8">
        </div>"#;

    const SIGNED_PAGE_VISITED: &str = r#"
        <div class="wp">
            <span class="btnvisted">今日已签到</span>
        </div>"#;

    const SIGNED_PAGE_DISABLED: &str = r#"
        <div class="wp">
            <a id="JD_sign" class="btna disabled" href="javascript:;">已签到</a>
        </div>"#;

    const SIGNED_PAGE_TEXT: &str = r#"
        <div class="wp">
            <a id="JD_sign" class="btna" href="javascript:;">签到</a>
            <p>今日已签，明天再来~</p>
        </div>"#;

    const LOGIN_PAGE: &str = r#"
        <form method="post">
            <input type="hidden" name="formhash" value="deadbeef">
            <input type="hidden" name="cookietime" id="cookietime_Ld2Fq" value="2592000">
            <input type="text" name="username" id="username_Ld2Fq">
            <input type="password" name="password" id="password_Ld2Fq">
        </form>"#;

    const LOGIN_PAGE_CAPTCHA: &str = r#"
        <form method="post">
            <input type="hidden" name="formhash" value="deadbeef">
            <input type="hidden" name="cookietime" id="cookietime_Ld2Fq" value="2592000">
            <input type="text" name="username" id="username_Ld2Fq">
            <input type="password" name="password" id="password_Ld2Fq">
            <input type="text" name="seccodeverify" id="seccodeverify_cSxxx1">
            <img src="misc.php?mod=seccode&amp;update=123&amp;idhash=cSxxx1" alt="">
        </form>"#;

    #[test]
    fn test_unsigned_page_not_signed() {
        // 按钮存在、可点、无 btnvisted、无已签文案
        assert!(!is_signed(UNSIGNED_PAGE));
    }

    #[test]
    fn test_visited_marker_means_signed() {
        assert!(is_signed(SIGNED_PAGE_VISITED));
    }

    #[test]
    fn test_disabled_button_means_signed() {
        assert!(is_signed(SIGNED_PAGE_DISABLED));
    }

    #[test]
    fn test_signed_text_means_signed() {
        assert!(is_signed(SIGNED_PAGE_TEXT));
    }

    #[test]
    fn test_missing_button_means_signed() {
        assert!(is_signed("<div class=\"wp\"></div>"));
    }

    #[test]
    fn test_extract_formhash_from_anchor() {
        assert_eq!(
            extract_sign_formhash(UNSIGNED_PAGE).as_deref(),
            Some("a1b2c3d4")
        );
    }

    #[test]
    fn test_formhash_absent_when_href_has_none() {
        assert_eq!(extract_sign_formhash(SIGNED_PAGE_DISABLED), None);
    }

    #[test]
    fn test_parse_login_form_without_captcha() {
        let form = parse_login_form(LOGIN_PAGE).unwrap();
        assert_eq!(form.formhash, "deadbeef");
        assert_eq!(form.cookietime, "2592000");
        assert_eq!(form.username_field_id, "username_Ld2Fq");
        assert_eq!(form.password_field_id, "password_Ld2Fq");
        assert!(form.captcha.is_none());
    }

    #[test]
    fn test_parse_login_form_with_captcha() {
        let form = parse_login_form(LOGIN_PAGE_CAPTCHA).unwrap();
        let captcha = form.captcha.unwrap();
        assert_eq!(captcha.idhash, "cSxxx1");
        assert_eq!(
            captcha.image_src.as_deref(),
            Some("misc.php?mod=seccode&update=123&idhash=cSxxx1")
        );
    }

    #[test]
    fn test_parse_login_form_missing_inputs() {
        let err = parse_login_form("<form></form>").unwrap_err();
        assert!(err.is_parse_missing());
    }

    #[test]
    fn test_parse_stats_full() {
        let stats = parse_stats(UNSIGNED_PAGE);
        assert_eq!(stats.consecutive_days, "4");
        assert_eq!(stats.level, "2");
        assert_eq!(stats.reward, "10");
        assert_eq!(stats.total_days, "49");
        assert_eq!(stats.rank, "8");
        assert!(stats.is_complete());
    }

    #[test]
    fn test_parse_stats_partial_defaults_to_sentinel() {
        let html = r#"<input id="lxdays" value="5"><input id="lxreward" value="10">"#;
        let stats = parse_stats(html);
        assert_eq!(stats.consecutive_days, "5");
        assert_eq!(stats.reward, "10");
        assert_eq!(stats.level, STAT_UNAVAILABLE);
        assert_eq!(stats.rank, STAT_UNAVAILABLE);
        assert!(!stats.is_complete());
    }

    #[test]
    fn test_login_response_markers() {
        assert!(is_login_welcome("<div>欢迎您回来，alice</div>"));
        assert!(is_wrong_captcha("<div>抱歉，验证码错误</div>"));
        assert!(is_wrong_password("<div>登录失败：密码错误次数过多</div>"));
        assert!(!is_wrong_password("<div>欢迎您回来</div>"));
    }

    #[test]
    fn test_home_logged_in_requires_both_markers() {
        assert!(is_home_logged_in("<a>访问我的空间</a> alice", "alice"));
        assert!(!is_home_logged_in("<a>访问我的空间</a>", "alice"));
        assert!(!is_home_logged_in("alice 的主页", "alice"));
    }
}
