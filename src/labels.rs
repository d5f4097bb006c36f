/// Static text for headers, record keys and figure titles
///
/// Japanese is the default so that existing report consumers keep reading
/// the same column names and record keys.
use crate::config::Language;
use crate::imaging::Channel;

/// Every language-dependent string the analyzer writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Labels {
    /// Tabular stream header, in column order
    pub csv_header: [&'static str; 10],

    // Record keys
    pub key_maker: &'static str,
    pub key_date: &'static str,
    pub key_count: &'static str,
    pub key_title: &'static str,
    pub key_mean: &'static str,
    pub key_median: &'static str,
    /// Record key for each channel, indexed by `Channel::index`
    pub key_channels: [&'static str; 3],

    // Figures
    /// Figure title for each channel
    pub figure_titles: [&'static str; 3],
    /// X axis label for each channel
    pub x_labels: [&'static str; 3],
    pub y_label: &'static str,
    /// Statistics box captions; the median caption differs from its record key
    pub summary_mean: &'static str,
    pub summary_median: &'static str,
}

const JAPANESE: Labels = Labels {
    csv_header: [
        "# 売上",
        "メーカー",
        "発売日",
        "タイトル",
        "色相の平均値",
        "色相の中央値",
        "彩度の平均値",
        "彩度の中央値",
        "明度の平均値",
        "明度の中央値",
    ],
    key_maker: "発売元",
    key_date: "発売日",
    key_count: "売上",
    key_title: "パッケージ名",
    key_mean: "平均値",
    key_median: "頻出値",
    key_channels: ["色相", "彩度", "明度"],
    figure_titles: [
        "図表: 色相 - 正規化済み",
        "図表: 彩度 - 正規化済み",
        "図表: 明度 - 正規化済み",
    ],
    x_labels: ["色相の値", "彩度の値", "明度の値"],
    y_label: "頻出度",
    summary_mean: "平均値",
    summary_median: "中央値",
};

const ENGLISH: Labels = Labels {
    csv_header: [
        "# Sales",
        "Maker",
        "Release date",
        "Title",
        "Hue mean",
        "Hue median",
        "Saturation mean",
        "Saturation median",
        "Brightness mean",
        "Brightness median",
    ],
    key_maker: "maker",
    key_date: "release_date",
    key_count: "sales",
    key_title: "title",
    key_mean: "mean",
    key_median: "median",
    key_channels: ["hue", "saturation", "brightness"],
    figure_titles: [
        "Figure of Hue - Normalized",
        "Figure of Saturation - Normalized",
        "Figure of Brightness - Normalized",
    ],
    x_labels: [
        "Value of Hue",
        "Value of saturation",
        "Value of brightness",
    ],
    y_label: "Frequent",
    summary_mean: "Mean",
    summary_median: "Median",
};

impl Labels {
    pub fn for_language(language: Language) -> &'static Labels {
        match language {
            Language::English => &ENGLISH,
            Language::Japanese => &JAPANESE,
        }
    }

    pub fn channel_key(&self, channel: Channel) -> &'static str {
        self.key_channels[channel.index()]
    }

    pub fn figure_title(&self, channel: Channel) -> &'static str {
        self.figure_titles[channel.index()]
    }

    pub fn x_label(&self, channel: Channel) -> &'static str {
        self.x_labels[channel.index()]
    }
}
