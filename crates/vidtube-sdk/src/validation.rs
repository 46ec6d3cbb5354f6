//! 客户端输入校验
//!
//! 校验在发起任何请求之前完成，失败统一返回 `VidtubeSDKError::Validation`，
//! 消息可直接展示在触发控件旁边。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, VidtubeSDKError};

/// 评论最大长度（字符数）
pub const MAX_COMMENT_LENGTH: usize = 1000;

/// 用户名最小长度
pub const MIN_USERNAME_LENGTH: usize = 3;

/// 密码最小长度
pub const MIN_PASSWORD_LENGTH: usize = 6;

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("compile username regex"));

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("compile email regex"));

/// 校验评论内容，返回去掉首尾空白后的文本
pub fn validate_comment_body(body: &str) -> Result<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(VidtubeSDKError::Validation("Comment text is required".to_string()));
    }

    let length = trimmed.chars().count();
    if length > MAX_COMMENT_LENGTH {
        return Err(VidtubeSDKError::Validation(format!(
            "Comment must be at most {} characters ({} given)",
            MAX_COMMENT_LENGTH, length
        )));
    }

    Ok(trimmed.to_string())
}

/// 登录表单
#[derive(Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new<E: Into<String>, P: Into<String>>(email: E, password: P) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(VidtubeSDKError::Validation("Password is required".to_string()));
        }
        Ok(())
    }
}

/// 注册表单
#[derive(Debug, Clone)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<()> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(VidtubeSDKError::Validation("Username is required".to_string()));
        }
        if username.chars().count() < MIN_USERNAME_LENGTH {
            return Err(VidtubeSDKError::Validation(format!(
                "Username must be at least {} characters long",
                MIN_USERNAME_LENGTH
            )));
        }
        if !USERNAME_REGEX.is_match(username) {
            return Err(VidtubeSDKError::Validation(
                "Username can only contain letters, numbers, and underscores".to_string(),
            ));
        }

        validate_email(&self.email)?;

        if self.password.is_empty() {
            return Err(VidtubeSDKError::Validation("Password is required".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(VidtubeSDKError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }

        if self.confirm_password.is_empty() {
            return Err(VidtubeSDKError::Validation("Please confirm your password".to_string()));
        }
        if self.password != self.confirm_password {
            return Err(VidtubeSDKError::Validation("Passwords do not match".to_string()));
        }

        Ok(())
    }
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(VidtubeSDKError::Validation("Email is required".to_string()));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(VidtubeSDKError::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }
    Ok(())
}
