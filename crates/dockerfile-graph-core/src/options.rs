use crate::lines::unquote;

pub fn copy_from(text: &str) -> Option<String> {
    leading_options(text)
        .find_map(|option| option.strip_prefix("--from="))
        .map(unquote)
        .filter(|reference| !reference.is_empty())
        .map(str::to_string)
}

pub fn mount_from(text: &str) -> Option<String> {
    leading_options(text)
        .filter_map(|option| option.strip_prefix("--mount="))
        .find_map(|spec| mount_field(spec, "from"))
}

fn mount_field(spec: &str, key: &str) -> Option<String> {
    unquote(spec)
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == key)
        .map(|(_, value)| unquote(value.trim()))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn leading_options(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
        .skip(1)
        .take_while(|token| token.starts_with("--"))
}
