// All LLM prompt constants for the AI writing endpoints.
// Templates use `{placeholder}` markers replaced before sending.

/// System prompt for the opening draft.
pub const GENERATE_SYSTEM: &str = "Anda adalah asisten penulis akademik. \
    Tulis naskah makalah pembuka yang informatif, terstruktur, dengan bahasa Indonesia formal. \
    Sertakan: Pendahuluan, Latar Belakang singkat, Rumusan Masalah poin, dan Tujuan Penelitian poin.";

/// Replace `{topic}` and `{style}`.
pub const GENERATE_PROMPT_TEMPLATE: &str =
    "Topik: {topic}. Gaya/Struktur: {style}. Tulis 4-6 paragraf (400-700 kata).";

/// Revision assistant. Replace `{topic}`.
pub const CHAT_SYSTEM_TEMPLATE: &str = "Anda adalah asisten revisi makalah. \
    Gunakan konteks dokumen (jika ada) untuk memberi saran per paragraf, perbaiki logika, tata bahasa, \
    dan tambahkan data/rujukan seperlunya. Balas ringkas dan langsung ke poin yang diminta pengguna. \
    Topik: {topic}.";

/// Prefix of the trailing user turn that carries the current document.
pub const CHAT_CONTEXT_PREFIX: &str = "Konteks dokumen saat ini:\n";

pub const TITLES_SYSTEM: &str = "Anda adalah asisten penulis akademik. \
    Berdasarkan topik yang diberikan, usulkan 3 judul makalah yang singkat, jelas, dan menarik. \
    Jawab hanya dengan daftar 3 judul, tanpa penjelasan.";

/// Replace `{topic}`.
pub const TITLES_PROMPT_TEMPLATE: &str = "Topik: {topic}";

pub const WORKFLOW_SYSTEM: &str =
    "Anda adalah asisten penulis akademik yang disiplin format. Keluarkan jawaban dalam JSON valid.";

/// Full paper workflow (variables, title, issues, chapter one). Replace `{topic}`.
pub const WORKFLOW_PROMPT_TEMPLATE: &str = r#"Buat workflow makalah otomatis dari Topik berikut.
Topik: {topic}

Langkah-langkah:
1) Tentukan tiga variabel:
- var1 (Konsep Permasalahan): inti masalah/fokus kajian.
- var2 (Pendukung Pemecahan): faktor/aktivitas pendukung.
- var3 (Outcome): tujuan akhir.
2) Bentuk Judul akhir dengan format: {var1} guna {var2} dalam rangka {var3}.
3) Identifikasi Permasalahan: ubah judul menjadi pertanyaan utama (1 kalimat).
4) Buat 5-7 persoalan turunan berbasis teori terkait var1. Jika var1 berhubungan dengan manajemen, gunakan 5M (Man, Material, Money, Method, Machine) sebagai dimensi.
5) Susun Bab I - Pendahuluan:
A. Latar Belakang: 3 paragraf, tiap paragraf ~500 kata. Urutan isi per paragraf: (1) mulai dari var3 (Outcome), (2) lanjut var2 (Pendukung), (3) terakhir var1 (Konsep Permasalahan). Sertakan data/angka atau rujukan faktual seperlunya.
B. Identifikasi Permasalahan: cantumkan pertanyaan utama dari langkah 3.
C. Persoalan-persoalan: daftar dari langkah 4.
D. Ruang Lingkup: Subjek, Objek, Metode (ringkas).

Keluarkan HASIL dalam JSON dengan skema:
{
  "variables": { "var1": string, "var2": string, "var3": string },
  "title": string,
  "question": string,
  "issues": string[],
  "bab1": {
    "latarBelakang": string,
    "identifikasiPermasalahan": string,
    "persoalan": string[],
    "ruangLingkup": { "subjek": string, "objek": string, "metode": string }
  }
}
Tanpa tambahan teks di luar JSON."#;

pub const GENERATE_TEMPERATURE: f32 = 0.4;
pub const CHAT_TEMPERATURE: f32 = 0.3;
pub const TITLES_TEMPERATURE: f32 = 0.4;
pub const WORKFLOW_TEMPERATURE: f32 = 0.35;

pub fn generate_prompt(topic: &str, style: &str) -> String {
    GENERATE_PROMPT_TEMPLATE
        .replace("{topic}", topic)
        .replace("{style}", style)
}

pub fn chat_system(topic: &str) -> String {
    CHAT_SYSTEM_TEMPLATE.replace("{topic}", topic)
}

pub fn titles_prompt(topic: &str) -> String {
    TITLES_PROMPT_TEMPLATE.replace("{topic}", topic)
}

/// Only the `{topic}` marker is substituted; `{var1}` etc. are literal
/// instructions to the model.
pub fn workflow_prompt(topic: &str) -> String {
    WORKFLOW_PROMPT_TEMPLATE.replacen("{topic}", topic, 1)
}
