use codeindex::Language;

pub fn list_languages() {
    println!("Supported languages:");
    for language in Language::supported() {
        let extensions: Vec<String> = language.extensions().iter().map(|e| format!(".{}", e)).collect();
        println!("  {:<12} {}", language.as_str(), extensions.join(" "));
    }
}
